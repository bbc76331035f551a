pub mod config;
pub mod error;
pub mod events;
pub mod facing_mode;
pub mod media_models;
pub mod state;
