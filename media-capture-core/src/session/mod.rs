pub mod audio_recorder;
pub mod camera_manager;
pub mod emitter;
pub mod processing_graph;
pub mod start_guard;
