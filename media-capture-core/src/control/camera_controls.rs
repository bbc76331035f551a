use std::sync::Arc;

use crate::models::error::CaptureError;
use crate::models::facing_mode::FacingMode;
use crate::session::camera_manager::{CameraManager, CameraSwitch};
use crate::traits::media_stream::MediaStream;

/// Camera switch button model.
///
/// Only exists while the manager offers the switch capability.
#[derive(Clone)]
pub struct CameraControls {
    switch: CameraSwitch,
}

impl CameraControls {
    /// Style hook for the rendered button.
    pub const CLASS_NAME: &'static str = "camera-switch-btn";

    /// `None` when there is nothing to switch between.
    pub fn render(manager: &CameraManager) -> Option<Self> {
        manager.switcher().map(|switch| Self { switch })
    }

    pub fn title(&self) -> &'static str {
        title_for(self.switch.facing_mode())
    }

    /// One press, one switch.
    pub async fn press(&self) -> Result<Arc<dyn MediaStream>, CaptureError> {
        self.switch.switch().await
    }
}

fn title_for(facing: FacingMode) -> &'static str {
    match facing {
        FacingMode::User => "Switch to rear camera",
        FacingMode::Environment => "Switch to front camera",
    }
}
