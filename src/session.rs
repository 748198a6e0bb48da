// Conversation state: the chat transcript, the insights panel content,
// and the lifecycle of the chart drawn for the latest reply.

use tracing::{debug, warn};

use crate::data::RowSet;
use crate::error::ResolveError;
use crate::render::{ChartRegistry, RenderOptions};
use crate::resolve;
use crate::response::AgentReply;

/// Canvas identity of the insights panel chart.
pub const INSIGHTS_CANVAS: &str = "insights-chart";

/// Shown in place of a chart when resolution or rendering fails.
const CHART_FAILURE_MESSAGE: &str = "Unable to display a chart for this result.";

/// Shown when a query succeeds but returns nothing to chart.
const NO_DATA_MESSAGE: &str = "The query ran successfully but returned no data.";

/// Shown when a reply carries no usable text.
const FALLBACK_REPLY_TEXT: &str = "I couldn't produce an answer for that request.";

#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptEntry {
    User { prompt: String },
    Agent { text: String, sql: Option<String> },
}

/// State of the insights panel chart area.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartState {
    /// Nothing charted for the current reply (table-only or no reply).
    Idle,
    /// A chart is live on the insights canvas.
    Rendered,
    /// Defined no-op: the reply had nothing to chart.
    Empty { message: String },
    /// Resolution or rendering failed; placeholder text instead.
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Insights {
    pub rows: RowSet,
    pub chart: ChartState,
}

/// Ticket for one outstanding request. Tokens increase monotonically;
/// a reply presenting an older token than the latest issued request is
/// discarded, so an out-of-order arrival can never overwrite a newer
/// answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestToken(u64);

pub struct Session {
    transcript: Vec<TranscriptEntry>,
    insights: Insights,
    registry: ChartRegistry,
    render_options: RenderOptions,
    latest_issued: u64,
}

impl Session {
    pub fn new(render_options: RenderOptions) -> Self {
        Self {
            transcript: Vec::new(),
            insights: Insights {
                rows: RowSet::default(),
                chart: ChartState::Idle,
            },
            registry: ChartRegistry::new(),
            render_options,
            latest_issued: 0,
        }
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    pub fn insights(&self) -> &Insights {
        &self.insights
    }

    pub fn live_chart_count(&self) -> usize {
        self.registry.live_count()
    }

    /// Encoded image of the live insights chart, for download.
    pub fn export_chart(&self) -> Option<&[u8]> {
        self.registry.export_image(INSIGHTS_CANVAS)
    }

    /// Record the prompt and issue the token its reply must present.
    pub fn begin_request(&mut self, prompt: &str) -> RequestToken {
        self.transcript.push(TranscriptEntry::User {
            prompt: prompt.to_string(),
        });
        self.latest_issued += 1;
        RequestToken(self.latest_issued)
    }

    /// Apply a backend reply. Returns false when the reply is stale
    /// (a newer request has been issued since) and was discarded.
    pub fn apply_reply(&mut self, token: RequestToken, reply: &AgentReply) -> bool {
        if token.0 < self.latest_issued {
            warn!(
                token = token.0,
                latest = self.latest_issued,
                "discarding stale reply"
            );
            return false;
        }

        if let Some(message) = &reply.error {
            self.transcript.push(TranscriptEntry::Agent {
                text: message.clone(),
                sql: None,
            });
            self.insights.rows = RowSet::default();
            self.fail_chart(ResolveError::Upstream {
                message: message.clone(),
            });
            return true;
        }

        let text = reply
            .summary_text()
            .unwrap_or(FALLBACK_REPLY_TEXT)
            .to_string();
        self.transcript.push(TranscriptEntry::Agent {
            text,
            sql: reply.sql.clone(),
        });

        let rows = match reply.rows() {
            Ok(rows) => rows,
            Err(e) => {
                self.insights.rows = RowSet::default();
                self.fail_chart(ResolveError::Upstream {
                    message: e.to_string(),
                });
                return true;
            }
        };
        self.insights.rows = rows.clone();

        match reply.blueprint() {
            Err(e) => self.fail_chart(e),
            Ok(None) => {
                // No chart requested; the previous one still goes away.
                self.registry.dispose(INSIGHTS_CANVAS);
                self.insights.chart = if rows.is_empty() {
                    ChartState::Empty {
                        message: NO_DATA_MESSAGE.to_string(),
                    }
                } else {
                    ChartState::Idle
                };
            }
            Ok(Some(blueprint)) => match resolve::resolve(&blueprint, &rows) {
                Ok(None) => {
                    self.registry.dispose(INSIGHTS_CANVAS);
                    self.insights.chart = ChartState::Empty {
                        message: NO_DATA_MESSAGE.to_string(),
                    };
                }
                Ok(Some(chart)) => {
                    match self
                        .registry
                        .render_chart(INSIGHTS_CANVAS, chart, &self.render_options)
                    {
                        Ok(()) => {
                            debug!("insights chart rendered");
                            self.insights.chart = ChartState::Rendered;
                        }
                        Err(e) => {
                            // The registry already released the old
                            // chart before the failed draw.
                            warn!(error = %e, "chart rendering failed");
                            self.insights.chart = ChartState::Failed {
                                message: CHART_FAILURE_MESSAGE.to_string(),
                            };
                        }
                    }
                }
                Err(e) => self.fail_chart(e),
            },
        }

        true
    }

    fn fail_chart(&mut self, error: ResolveError) {
        warn!(error = %error, "chart resolution failed");
        self.registry.dispose(INSIGHTS_CANVAS);
        self.insights.chart = ChartState::Failed {
            message: CHART_FAILURE_MESSAGE.to_string(),
        };
    }
}
