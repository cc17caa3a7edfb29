use crate::record::ContextKey;

/// Failure reported by a host transport before it is mapped onto [`ToolWindowError`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostFault {
    #[error("host unreachable: {0}")]
    Unavailable(String),
    #[error("host rejected command ({code}): {message}")]
    Rejected { code: String, message: String },
}

pub const HOST_CODE_UNKNOWN_WINDOW: &str = "unknown_window";
pub const HOST_CODE_WINDOW_CREATION_FAILED: &str = "window_creation_failed";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolWindowError {
    #[error("native host unavailable: {0}")]
    HostUnavailable(String),
    #[error("native host has no window {0}")]
    UnknownWindow(String),
    #[error("native host failed to create window: {0}")]
    WindowCreationFailed(String),
    #[error("{}", describe_mismatch(.requested, .current))]
    ContextMismatch {
        /// `None` when the call acts on whatever context is current.
        requested: Option<String>,
        current: Option<ContextKey>,
    },
    #[error("timed out after {0}ms waiting for the host to inject a book context")]
    ContextHandoffTimedOut(u64),
    #[error("host dropped the context handoff before resolving it")]
    ContextHandoffDropped,
    #[error("invalid host payload: {0}")]
    InvalidPayload(String),
    #[error("geometry hint store: {0}")]
    HintStore(String),
}

impl ToolWindowError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::HostUnavailable(_) => "host_unavailable",
            Self::UnknownWindow(_) => "unknown_window",
            Self::WindowCreationFailed(_) => "window_creation_failed",
            Self::ContextMismatch { .. } => "context_mismatch",
            Self::ContextHandoffTimedOut(_) => "context_handoff_timed_out",
            Self::ContextHandoffDropped => "context_handoff_dropped",
            Self::InvalidPayload(_) => "invalid_payload",
            Self::HintStore(_) => "hint_store",
        }
    }

    pub(crate) fn context_mismatch(requested: &ContextKey, current: Option<&ContextKey>) -> Self {
        Self::ContextMismatch {
            requested: Some(requested.to_string()),
            current: current.cloned(),
        }
    }

    pub(crate) fn no_context() -> Self {
        Self::ContextMismatch {
            requested: None,
            current: None,
        }
    }

    /// Maps a transport fault for a command that addressed `window_id`.
    pub(crate) fn from_host_fault(fault: HostFault, window_id: Option<&str>) -> Self {
        match fault {
            HostFault::Unavailable(message) => Self::HostUnavailable(message),
            HostFault::Rejected { code, message } => match code.as_str() {
                HOST_CODE_UNKNOWN_WINDOW => {
                    Self::UnknownWindow(window_id.map_or(message, str::to_string))
                }
                HOST_CODE_WINDOW_CREATION_FAILED => Self::WindowCreationFailed(message),
                _ => Self::HostUnavailable(format!("{code}: {message}")),
            },
        }
    }
}

fn describe_mismatch(requested: &Option<String>, current: &Option<ContextKey>) -> String {
    match (requested, current) {
        (Some(requested), Some(current)) => {
            format!("context {requested} is not the current session context {current}")
        }
        (Some(requested), None) => {
            format!("context {requested} requested but no session context is set")
        }
        (None, Some(current)) => format!("current session context is {current}"),
        (None, None) => "no session context is set".to_string(),
    }
}
