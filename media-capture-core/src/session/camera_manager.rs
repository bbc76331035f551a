use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::config::CameraConfig;
use crate::models::error::CaptureError;
use crate::models::events::CameraEvent;
use crate::models::facing_mode::FacingMode;
use crate::models::media_models::{CaptureSession, DeviceKind, SessionParams, VideoConstraints};
use crate::models::state::CameraState;
use crate::session::emitter::EventEmitter;
use crate::traits::camera::{CameraService, DeviceEnumerator};
use crate::traits::media_stream::{MediaStream, TrackEnd};

#[derive(Default)]
struct Live {
    state: CameraState,
    // Last facing mode that was successfully acquired.
    facing: FacingMode,
    stream: Option<Arc<dyn MediaStream>>,
    session: Option<CaptureSession>,
}

struct CameraInner {
    config: CameraConfig,
    cameras: Arc<dyn CameraService>,
    events: EventEmitter<CameraEvent>,
    multiple_cameras: bool,
    // Serializes start, stop and switch end to end.
    operation: tokio::sync::Mutex<()>,
    live: Mutex<Live>,
}

/// Camera stream owner with front/rear switching.
///
/// Cloning yields another handle to the same manager.
#[derive(Clone)]
pub struct CameraManager {
    inner: Arc<CameraInner>,
}

impl CameraManager {
    /// Build a manager and probe the device inventory once.
    ///
    /// An inventory failure is logged and treated as a single camera.
    pub async fn initialize(
        config: CameraConfig,
        cameras: Arc<dyn CameraService>,
        devices: &dyn DeviceEnumerator,
    ) -> Result<Self, CaptureError> {
        config.validate()?;

        let multiple_cameras = match devices.enumerate().await {
            Ok(devices) => {
                let count = devices
                    .iter()
                    .filter(|d| d.kind == DeviceKind::VideoInput)
                    .count();
                log::info!("Found {} camera(s)", count);
                count > 1
            }
            Err(e) => {
                log::warn!("Error checking for multiple cameras: {}", e);
                false
            }
        };

        let events = EventEmitter::new(config.event_capacity);
        let live = Live {
            facing: config.initial_facing,
            ..Default::default()
        };
        Ok(Self {
            inner: Arc::new(CameraInner {
                config,
                cameras,
                events,
                multiple_cameras,
                operation: tokio::sync::Mutex::new(()),
                live: Mutex::new(live),
            }),
        })
    }

    pub fn config(&self) -> &CameraConfig {
        &self.inner.config
    }

    pub fn facing_mode(&self) -> FacingMode {
        self.inner.live.lock().facing
    }

    pub fn state(&self) -> CameraState {
        self.inner.live.lock().state
    }

    pub fn has_multiple_cameras(&self) -> bool {
        self.inner.multiple_cameras
    }

    /// The live stream, if any.
    pub fn stream(&self) -> Option<Arc<dyn MediaStream>> {
        self.inner.live.lock().stream.clone()
    }

    pub fn session(&self) -> Option<CaptureSession> {
        self.inner.live.lock().session.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CameraEvent> {
        self.inner.events.subscribe()
    }

    /// The switch capability, present only when more than one camera exists.
    pub fn switcher(&self) -> Option<CameraSwitch> {
        self.inner.multiple_cameras.then(|| CameraSwitch {
            manager: self.clone(),
        })
    }

    /// Acquire a stream for the current facing mode. While already active the
    /// live stream is returned without a second acquisition.
    pub async fn start(&self) -> Result<Arc<dyn MediaStream>, CaptureError> {
        let _op = self.inner.operation.lock().await;

        let facing = {
            let live = self.inner.live.lock();
            if let (true, Some(stream)) = (live.state.is_active(), live.stream.as_ref()) {
                return Ok(Arc::clone(stream));
            }
            live.facing
        };

        let constraints = self.inner.config.constraints(facing);
        match self.inner.acquire(constraints).await {
            Ok(stream) => {
                log::info!("Camera started facing {}", facing);
                Ok(stream)
            }
            Err(e) => {
                log::error!("Error accessing camera: {}", e);
                Err(e)
            }
        }
    }

    /// Release all tracks. Safe from any state.
    pub async fn stop(&self) {
        let _op = self.inner.operation.lock().await;
        if self.inner.release() {
            log::info!("Camera stopped");
        }
        self.inner.set_state(CameraState::Idle);
    }

    async fn switch(&self) -> Result<Arc<dyn MediaStream>, CaptureError> {
        let _op = self.inner.operation.lock().await;

        let original = self.facing_mode();
        let requested = original.flipped();
        self.inner.release();
        // Never report Active without a live session.
        self.inner.set_state(CameraState::Idle);

        let primary = match self
            .inner
            .acquire(self.inner.config.constraints(requested))
            .await
        {
            Ok(stream) => {
                log::info!("Switched camera to {}", requested);
                return Ok(stream);
            }
            Err(e) => e,
        };
        log::warn!(
            "Error switching camera to {}: {}, falling back to {}",
            requested,
            primary,
            original
        );

        match self
            .inner
            .acquire(VideoConstraints::facing_only(original))
            .await
        {
            Ok(_) => Err(CaptureError::SwitchReverted {
                requested,
                restored: original,
                reason: primary.to_string(),
            }),
            Err(fallback) => {
                log::error!("Fallback to {} camera failed: {}", original, fallback);
                self.inner.set_state(CameraState::Idle);
                Err(match fallback {
                    CaptureError::DeviceUnavailable(_) => fallback,
                    other => CaptureError::DeviceUnavailable(other.to_string()),
                })
            }
        }
    }
}

impl CameraInner {
    /// Open a stream and make it the live session. The facing mode is
    /// committed only here.
    async fn acquire(
        self: &Arc<Self>,
        constraints: VideoConstraints,
    ) -> Result<Arc<dyn MediaStream>, CaptureError> {
        let stream = self.cameras.open(constraints).await?;
        let facing = constraints.facing_mode;
        let session = CaptureSession::new(stream.id(), SessionParams::Video(constraints));
        let session_id = session.id;
        {
            let mut live = self.live.lock();
            live.facing = facing;
            live.stream = Some(Arc::clone(&stream));
            live.session = Some(session);
        }
        self.set_state(CameraState::Active { facing });
        self.watch_tracks(&stream, session_id);
        Ok(stream)
    }

    /// Stop the live tracks without touching the reported state.
    fn release(&self) -> bool {
        let stream = {
            let mut live = self.live.lock();
            live.session = None;
            live.stream.take()
        };
        match stream {
            Some(stream) => {
                stream.stop_tracks();
                log::debug!("Released camera stream {}", stream.id());
                true
            }
            None => false,
        }
    }

    fn watch_tracks(self: &Arc<Self>, stream: &Arc<dyn MediaStream>, session_id: Uuid) {
        let weak = Arc::downgrade(self);
        stream.on_track_ended(Arc::new(move |end: TrackEnd| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_track_end(session_id, end);
            }
        }));
    }

    fn handle_track_end(&self, session_id: Uuid, end: TrackEnd) {
        let current = self.live.lock().session.as_ref().map(|s| s.id);
        if current != Some(session_id) {
            return;
        }

        let fault = CaptureError::TrackFault(match end {
            TrackEnd::Ended => "camera track ended".into(),
            TrackEnd::Failed(reason) => reason,
        });
        log::warn!("Camera track stopped, releasing session: {}", fault);
        self.events.emit(CameraEvent::Error(fault));
        self.release();
        self.set_state(CameraState::Idle);
    }

    fn set_state(&self, state: CameraState) {
        let changed = {
            let mut live = self.live.lock();
            std::mem::replace(&mut live.state, state) != state
        };
        if changed {
            log::debug!("Camera state -> {:?}", state);
            self.events.emit(CameraEvent::State(state));
        }
    }
}

impl Drop for CameraInner {
    fn drop(&mut self) {
        if let Some(stream) = self.live.get_mut().stream.take() {
            stream.stop_tracks();
        }
    }
}

/// Handle to the front/rear switch operation of a [`CameraManager`].
#[derive(Clone)]
pub struct CameraSwitch {
    manager: CameraManager,
}

impl CameraSwitch {
    /// Stop the current session, flip the facing mode and reacquire.
    ///
    /// The state passes through `Idle` while no stream is held.
    /// When the flipped camera cannot be opened the original one is restored
    /// and `SwitchReverted` is returned. When that also fails the manager
    /// ends idle with `DeviceUnavailable`.
    pub async fn switch(&self) -> Result<Arc<dyn MediaStream>, CaptureError> {
        self.manager.switch().await
    }

    pub fn facing_mode(&self) -> FacingMode {
        self.manager.facing_mode()
    }
}
