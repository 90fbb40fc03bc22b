pub mod audio_output;
pub mod clock;
pub mod sampler_delegate;
pub mod serial_transport;
