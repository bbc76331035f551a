pub mod pcm;
pub mod resample;
pub mod ring_buffer;
pub mod volume;
