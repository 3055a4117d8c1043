//! Voice streaming engine for a soundboard client.
//!
//! A track is decoded into canonical 48 kHz / 16-bit / stereo PCM, shaped by a
//! pitch or boost stage and written to a voice transport in fixed 20 ms blocks.
//! All mutable engine state lives inside a single actor task; callers talk to it
//! through the cloneable [`engine::Engine`] handle.

pub mod audio;
pub mod common;
pub mod configs;
pub mod engine;
pub mod transport;

pub use engine::{ConnectionTier, Engine, EngineEvent, PlaybackRequest, SourceLocator};
