pub mod audio_context;
pub mod camera;
pub mod media_stream;
pub mod microphone;
pub mod refresh_scheduler;
