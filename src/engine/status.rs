use std::{
    sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, Ordering},
    time::Duration,
};

use super::connection::ConnectionTier;

/// Lock-free snapshot of the engine, written only by the engine task.
///
/// Reads never block on the task and never change state.
#[derive(Default)]
pub struct EngineStatus {
    tier: AtomicU8,
    streaming: AtomicBool,
    paused: AtomicBool,
    boost: AtomicBool,
    looping: AtomicBool,
    buffer_empty: AtomicBool,
    skip_count: AtomicU32,
    position_ms: AtomicU64,
    duration_ms: AtomicU64,
    pitch: AtomicU32,
    volume: AtomicU32,
}

/// Plain copy of [`EngineStatus`] at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub tier: ConnectionTier,
    pub streaming: bool,
    pub paused: bool,
    pub boost: bool,
    pub looping: bool,
    pub buffer_empty: bool,
    pub skip_count: u32,
    pub position: Duration,
    pub duration: Duration,
    pub pitch: f32,
    pub volume: f32,
}

impl EngineStatus {
    pub fn new(pitch: f32, volume: f32) -> Self {
        let status = Self::default();
        status.buffer_empty.store(true, Ordering::Relaxed);
        status.set_pitch(pitch);
        status.set_volume(volume);
        status
    }

    pub fn tier(&self) -> ConnectionTier {
        ConnectionTier::from_u8(self.tier.load(Ordering::Acquire))
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Acquire)
    }

    pub fn position(&self) -> Duration {
        Duration::from_millis(self.position_ms.load(Ordering::Relaxed))
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms.load(Ordering::Relaxed))
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            tier: self.tier(),
            streaming: self.is_streaming(),
            paused: self.paused.load(Ordering::Relaxed),
            boost: self.boost.load(Ordering::Relaxed),
            looping: self.looping.load(Ordering::Relaxed),
            buffer_empty: self.buffer_empty.load(Ordering::Relaxed),
            skip_count: self.skip_count.load(Ordering::Relaxed),
            position: self.position(),
            duration: self.duration(),
            pitch: f32::from_bits(self.pitch.load(Ordering::Relaxed)),
            volume: f32::from_bits(self.volume.load(Ordering::Relaxed)),
        }
    }

    pub(crate) fn set_tier(&self, tier: ConnectionTier) {
        self.tier.store(tier as u8, Ordering::Release);
    }

    pub(crate) fn set_streaming(&self, on: bool) {
        self.streaming.store(on, Ordering::Release);
    }

    pub(crate) fn set_paused(&self, on: bool) {
        self.paused.store(on, Ordering::Relaxed);
    }

    pub(crate) fn set_boost(&self, on: bool) {
        self.boost.store(on, Ordering::Relaxed);
    }

    pub(crate) fn set_looping(&self, on: bool) {
        self.looping.store(on, Ordering::Relaxed);
    }

    pub(crate) fn set_buffer_empty(&self, on: bool) {
        self.buffer_empty.store(on, Ordering::Relaxed);
    }

    pub(crate) fn set_skip_count(&self, n: u32) {
        self.skip_count.store(n, Ordering::Relaxed);
    }

    pub(crate) fn set_position(&self, position: Duration, duration: Duration) {
        self.position_ms
            .store(position.as_millis() as u64, Ordering::Relaxed);
        self.duration_ms
            .store(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub(crate) fn set_pitch(&self, pitch: f32) {
        self.pitch.store(pitch.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn set_volume(&self, volume: f32) {
        self.volume.store(volume.to_bits(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_status_is_idle() {
        let status = EngineStatus::new(1.0, 0.5);
        let snap = status.snapshot();
        assert_eq!(snap.tier, ConnectionTier::Disconnected);
        assert!(!snap.streaming);
        assert!(snap.buffer_empty);
        assert_eq!(snap.position, Duration::ZERO);
        assert_eq!(snap.volume, 0.5);
    }

    #[test]
    fn floats_survive_the_bit_cast() {
        let status = EngineStatus::new(1.25, 1.0);
        status.set_volume(0.3);
        assert_eq!(status.snapshot().pitch, 1.25);
        assert_eq!(status.snapshot().volume, 0.3);
    }
}
