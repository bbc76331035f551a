use super::facing_mode::FacingMode;

/// Microphone recorder state machine.
///
/// State transitions:
/// ```text
/// idle → starting → recording
///   ↑        │          │
///   └────────┴──────────┘  (failure, stop, track fault)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecorderState {
    #[default]
    Idle,
    Starting,
    Recording,
}

impl RecorderState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Recording => "recording",
        }
    }
}

/// Camera manager state machine.
///
/// ```text
/// idle → active ⟲ (switch)
///   ↑       │
///   └───────┘  (stop, track fault, failed switch without fallback)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraState {
    #[default]
    Idle,
    Active { facing: FacingMode },
}

impl CameraState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    /// Facing mode of the live session, if any.
    pub fn facing(&self) -> Option<FacingMode> {
        match self {
            Self::Active { facing } => Some(*facing),
            Self::Idle => None,
        }
    }
}
