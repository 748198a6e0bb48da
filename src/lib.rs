// Library exports for askgraph
//
// Pipeline: a backend reply (response) carries rows (data) and a chart
// blueprint (blueprint); the engine (resolve) materializes the
// blueprint against the rows; the sink (render) draws the result and
// tracks per-canvas chart lifecycle; session ties it to a transcript.

pub mod blueprint;
pub mod data;
pub mod error;
pub mod palette;
pub mod render;
pub mod resolve;
pub mod response;
pub mod session;
