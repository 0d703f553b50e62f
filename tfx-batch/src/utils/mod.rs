//! Utility modules for tfx-batch

pub mod audio_decoder;

pub use audio_decoder::{decode_audio_file, DecodedAudio};
