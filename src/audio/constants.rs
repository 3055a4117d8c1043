//! Central constants for the audio pipeline.
//!
//! The output format is fixed for the lifetime of the engine: every track is
//! normalised to it before any effect stage runs.

// ── Canonical PCM format ─────────────────────────────────────────────────────

/// Output sample rate sent to the voice transport (Hz).
pub const TARGET_SAMPLE_RATE: u32 = 48_000;

/// Output sample rate as a float, used in effect maths.
pub const SAMPLE_RATE_F64: f64 = 48_000.0;

/// Interleaved output channels.
pub const CHANNELS: usize = 2;

/// Bits per output sample.
pub const BIT_DEPTH: usize = 16;

/// Bytes per output sample.
pub const BYTES_PER_SAMPLE: usize = BIT_DEPTH / 8;

/// Bytes per second of canonical PCM.
pub const BYTES_PER_SECOND: usize = TARGET_SAMPLE_RATE as usize * BYTES_PER_SAMPLE * CHANNELS;

// ── Packet cadence ───────────────────────────────────────────────────────────

/// Blocks handed to the transport per second.
pub const PACKETS_PER_SECOND: usize = 50;

/// Duration of one block in milliseconds.
pub const FRAME_DURATION_MS: u64 = 1_000 / PACKETS_PER_SECOND as u64;

/// Bytes per block: 3 840 for 48 kHz stereo 16-bit at 50 packets/s.
pub const BLOCK_SIZE: usize = BYTES_PER_SECOND / PACKETS_PER_SECOND;

/// Interleaved i16 samples per block.
pub const BLOCK_SAMPLES: usize = BLOCK_SIZE / BYTES_PER_SAMPLE;

// ── Effects ──────────────────────────────────────────────────────────────────

/// Linear gain of the boost chain (+40 dB).
pub const BOOST_GAIN: f32 = 100.0;

/// Accepted pitch factor range.
pub const MIN_PITCH: f32 = 0.1;
pub const MAX_PITCH: f32 = 5.0;

/// Grain length of the delay-line pitch shifter.
pub const PITCH_WINDOW_MS: f64 = 40.0;

// ── HttpSource ───────────────────────────────────────────────────────────────

/// HTTP prefetch buffer size (8 MB): how much data can be stored ahead.
pub const HTTP_PREFETCH_BUFFER_SIZE: usize = 8 * 1_024 * 1_024;

/// Smallest buffer capacity used for initial fetching (256 KB).
pub const HTTP_INITIAL_BUF_CAPACITY: usize = 256 * 1_024;

/// Forward seeks up to this many bytes skip data on the open connection.
pub const HTTP_SOCKET_SKIP_LIMIT: u64 = 1_000_000;

/// Limit for a single HTTP range fetch in the prefetch loop (5 MB).
pub const HTTP_FETCH_CHUNK_LIMIT: u64 = 5 * 1_024 * 1_024;

/// Maximum times a range fetch is retried before the source gives up.
pub const MAX_FETCH_RETRIES: usize = 5;

/// Request timeout for the HTTP client.
pub const HTTP_TIMEOUT_SECS: u64 = 15;
