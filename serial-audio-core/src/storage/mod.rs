pub mod config_file;
pub mod metadata;
pub mod wav_writer;
