pub mod playback_queue;
pub mod rate_estimator;
pub mod sample_reader;
pub mod sample_scaler;
pub mod wav_format;
