use super::error::CaptureError;

/// Capture loop state machine.
///
/// State transitions:
/// ```text
/// idle → initializing → capturing → stopping → closed
///             ↓                                  ↑
///             └──────────── (init failure) ──────┘
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureState {
    Idle,
    Initializing,
    Capturing { payload_bytes: u64 },
    Stopping { error: Option<CaptureError> },
    Closed { error: Option<CaptureError> },
}

impl CaptureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self, Self::Capturing { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }

    /// A new session may only start from here.
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Idle | Self::Closed { .. })
    }

    /// The error the session is stopping or closed with, if any.
    pub fn error(&self) -> Option<&CaptureError> {
        match self {
            Self::Stopping { error } | Self::Closed { error } => error.as_ref(),
            _ => None,
        }
    }

    /// Short lowercase name, used in logs and the CLI.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Initializing => "initializing",
            Self::Capturing { .. } => "capturing",
            Self::Stopping { .. } => "stopping",
            Self::Closed { .. } => "closed",
        }
    }
}
