//! Per-subsystem error taxonomy (ambient stack item A1), mirroring the
//! teacher's `ProviderError` shape: one `thiserror` enum per concern,
//! composed at call sites that span subsystems.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("attachment upload failed with status {status}: {body}")]
    UploadFailed { status: u16, body: String },
    #[error("network error talking to the attachment service: {0}")]
    Network(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum CostError {
    #[error("cost request failed: {0}")]
    RequestError(String),
    #[error("insufficient funds to authorize this request")]
    InsufficientFund,
    #[error("network error talking to the cost channel: {0}")]
    Network(#[from] reqwest::Error),
    #[error("bot_query_id is required for cost requests")]
    MissingBotQueryId,
    #[error("bot has no access key configured")]
    MissingAccessKey,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unauthorized: access key mismatch")]
    Unauthorized,
    #[error("unsupported request type: {0}")]
    UnsupportedRequestType(String),
    #[error("malformed request body: {0}")]
    MalformedBody(#[from] serde_json::Error),
}

/// The client-side error taxonomy (C6): `BotError`/`BotErrorNoRetry` from
/// `client.py`, flattened into a single enum whose variants say whether
/// they are retriable.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("bot error (retriable): {0}")]
    Retryable(String),
    #[error("bot error (not retriable): {0}")]
    NonRetryable(String),
    #[error("error communicating with bot {bot_name}: {source}")]
    Transport {
        bot_name: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("malformed JSON from bot: {0}")]
    MalformedJson(#[from] serde_json::Error),
    #[error("invalid settings returned by bot: {0}")]
    InvalidBotSettings(String),
}

impl ClientError {
    pub fn allow_retry(&self) -> bool {
        matches!(self, ClientError::Retryable(_) | ClientError::Transport { .. })
    }
}

#[derive(Debug, Error)]
pub enum SyncBridgeError {
    #[error("run_sync was called from within an async context with a loop-bound resource; call the async variant directly")]
    LoopBoundResource,
    #[error("background runtime thread panicked: {0}")]
    WorkerPanicked(String),
}

/// Crate-level umbrella, used only by the binary entry point where errors
/// from multiple subsystems can surface together.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Cost(#[from] CostError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    SyncBridge(#[from] SyncBridgeError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
