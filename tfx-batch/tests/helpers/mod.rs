//! Test Helper Utilities
//!
//! Shared utilities for tfx-batch integration tests

#![allow(dead_code)]

pub mod audio_generator;
pub mod fakes;

pub use audio_generator::{generate_click_track, generate_silence, generate_test_wav, AudioConfig};
pub use fakes::{
    test_backends, test_config, write_reference_file, AcquireBehavior, FakeAcquirer, FakeCatalog,
    FakeProber, StubExtractor, AcquireCall,
};
