use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use super::{
    events::{EngineEvent, EventHub},
    status::EngineStatus,
};
use crate::audio::{
    AudioPipeline, PitchStage, SourceStage,
    constants::{MAX_PITCH, MIN_PITCH},
};

/// Owns the pitch and boost settings and applies them to the pipeline.
///
/// Pitch changes rebuild the pitch chain from the shared source stage, which
/// costs a fresh delay-line allocation per call: fine for user-driven
/// controls, wasteful per block. Boost only selects which chain is read.
pub struct EffectController {
    pitch: f32,
    boost: bool,
    events: Arc<EventHub>,
    status: Arc<EngineStatus>,
}

impl EffectController {
    pub fn new(pitch: f32, events: Arc<EventHub>, status: Arc<EngineStatus>) -> Self {
        let pitch = pitch.clamp(MIN_PITCH, MAX_PITCH);
        status.set_pitch(pitch);
        Self {
            pitch,
            boost: false,
            events,
            status,
        }
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn boost(&self) -> bool {
        self.boost
    }

    /// Attach pitch and boost chains to a freshly decoded source.
    pub fn build_pipeline(&self, source: SourceStage, track: &str) -> AudioPipeline {
        let source = Arc::new(Mutex::new(source));
        let pitch = PitchStage::new(source.clone(), self.pitch);
        AudioPipeline::assemble(source, pitch, track)
    }

    /// Rebuild the pitch chain. The boost chain keeps its load-time snapshot.
    pub fn set_pitch(&mut self, factor: f32, pipeline: Option<&mut AudioPipeline>) {
        self.pitch = factor.clamp(MIN_PITCH, MAX_PITCH);
        self.status.set_pitch(self.pitch);
        if let Some(pipeline) = pipeline {
            let stage = PitchStage::new(pipeline.source().clone(), self.pitch);
            pipeline.replace_pitch(stage);
        }
        info!("pitch set to {}", self.pitch);
    }

    /// Direct toggle. Always notifies.
    pub fn set_boost(&mut self, enabled: bool) {
        self.boost = enabled;
        self.status.set_boost(enabled);
        debug!("boost {}", if enabled { "on" } else { "off" });
        self.events.emit(EngineEvent::BoostStateChanged(enabled));
    }

    /// Boost flag carried by a load request. Notifies only on change.
    pub fn apply_load_boost(&mut self, enabled: bool) {
        if self.boost != enabled {
            self.set_boost(enabled);
        }
    }
}
