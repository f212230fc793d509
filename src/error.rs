use thiserror::Error;

/// Error taxonomy for the ingestion pipeline.
///
/// The split matters for recovery policy: transient upstream failures are
/// retried inside the HTTP layer and only surface once the retry budget is
/// gone; everything else propagates to the per-candidate boundary where the
/// orchestrator converts it into a fail-count increment.
#[derive(Error, Debug)]
pub enum Error {
    /// Rate limiting or network-level failure that survived every retry.
    #[error("transient upstream failure after {attempts} attempts (last status: {last_status:?})")]
    TransientUpstream {
        attempts: u32,
        last_status: Option<u16>,
    },
    /// Non-2xx, non-429 response. Not retried.
    #[error("upstream http {status}: {status_text}")]
    Upstream { status: u16, status_text: String },
    /// The AI upstream answered but produced no usable text.
    #[error("generation: {0}")]
    Generation(String),
    /// An app id with no resolvable store detail.
    #[error("game not found: app_id={0}")]
    NotFound(u32),
    /// State file load/save failure. Always fatal to the run.
    #[error("state io: {0}")]
    StateIo(String),
    /// Missing or unreadable configuration (tokens, prompt files).
    #[error("config: {0}")]
    Config(String),
    /// Artifact write failure. Fatal to the item being processed.
    #[error("io: {0}")]
    Io(String),
    #[error("network: {0}")]
    Net(#[from] reqwest::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
