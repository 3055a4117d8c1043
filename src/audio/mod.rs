pub mod constants;
pub mod decoder;
pub mod demux;
pub mod pipeline;
pub mod resample;
pub mod source;

pub use decoder::SymphoniaSource;
pub use pipeline::{AudioPipeline, PcmStage, PitchStage, SharedSource, SourceStage};
pub use source::{
    AudioSource, CaptureProvider, DefaultResolver, MemorySource, PcmSource, SourceLocator,
    SourceResolver, SourceSpec,
};
