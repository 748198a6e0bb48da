use thiserror::Error;

/// Failure modes of chart resolution. These are the only errors the
/// engine returns; it never panics on bad input. The caller turns any
/// of them into a placeholder message in the insights panel.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("malformed blueprint: {reason}")]
    MalformedBlueprint { reason: String },
    #[error("column '{column}' not found in any result row")]
    MissingColumn { column: String },
    #[error("internal inconsistency: {detail}")]
    InternalInconsistency { detail: String },
    /// Backend or transport failure text carried in a reply. Produced
    /// by the session layer, never by `resolve` itself.
    #[error("upstream failure: {message}")]
    Upstream { message: String },
}
