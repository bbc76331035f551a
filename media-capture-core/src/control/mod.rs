pub mod camera_controls;
