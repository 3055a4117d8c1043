//! Demux layer: container probing and codec selection.
//!
//! [`open_format`] hands a byte source to symphonia's probe, picks the first
//! decodable track and builds a decoder for it. [`detect_format`] sniffs a
//! header when the caller has no extension or MIME hint to offer.

pub mod format;

pub use format::detect_format;
use symphonia::core::{
    codecs::{CODEC_TYPE_NULL, Decoder, DecoderOptions},
    formats::{FormatOptions, FormatReader},
    io::{MediaSource, MediaSourceStream},
    meta::MetadataOptions,
    probe::Hint,
    units::TimeBase,
};
use tracing::debug;

use crate::{
    audio::constants::{CHANNELS, TARGET_SAMPLE_RATE},
    common::{errors::PipelineError, types::AudioFormat},
};

/// A probed container with its selected audio track.
pub struct Demuxed {
    pub format: Box<dyn FormatReader>,
    pub decoder: Box<dyn Decoder>,
    pub track_id: u32,
    pub sample_rate: u32,
    pub channels: usize,
    pub time_base: Option<TimeBase>,
    /// Track length in timestamp units, when the container declares it.
    pub n_frames: Option<u64>,
    /// Whether the underlying byte source can seek.
    pub seekable: bool,
}

/// Open a media source and detect its format.
pub fn open_format(
    source: Box<dyn MediaSource>,
    kind: Option<AudioFormat>,
) -> Result<Demuxed, PipelineError> {
    let seekable = source.is_seekable();
    let mss = MediaSourceStream::new(source, Default::default());

    let mut hint = Hint::new();
    if let Some(k) = &kind {
        let ext = k.as_ext();
        if !ext.is_empty() {
            hint.with_extension(ext);
        }
        if let Some(mime) = k.as_mime() {
            hint.mime_type(mime);
        }
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions {
            enable_gapless: true,
            ..Default::default()
        },
        &MetadataOptions::default(),
    )?;

    let format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| PipelineError::Unsupported("no audio track found".into()))?;

    let params = &track.codec_params;
    let track_id = track.id;
    let sample_rate = params.sample_rate.unwrap_or(TARGET_SAMPLE_RATE);
    let channels = params.channels.map(|c| c.count()).unwrap_or(CHANNELS);
    let time_base = params.time_base;
    let n_frames = params.n_frames;

    let decoder = symphonia::default::get_codecs().make(params, &DecoderOptions::default())?;

    debug!(
        "demux: track {} {}Hz {}ch seekable={} frames={:?}",
        track_id, sample_rate, channels, seekable, n_frames
    );

    Ok(Demuxed {
        format,
        decoder,
        track_id,
        sample_rate,
        channels,
        time_base,
        n_frames,
        seekable,
    })
}
