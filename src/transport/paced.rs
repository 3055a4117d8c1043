use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::trace;

use super::PcmSink;
use crate::{audio::constants::FRAME_DURATION_MS, common::errors::TransportError};

/// Spaces writes to the inner sink at the 20 ms packet cadence.
///
/// The first write after opening goes out immediately. Missed ticks are
/// skipped rather than burst, so a stall never produces a flood of packets.
pub struct PacedSink<S> {
    inner: S,
    period: Duration,
    interval: Option<Interval>,
}

impl<S: PcmSink> PacedSink<S> {
    pub fn new(inner: S) -> Self {
        Self::with_period(inner, Duration::from_millis(FRAME_DURATION_MS))
    }

    pub fn with_period(inner: S, period: Duration) -> Self {
        Self {
            inner,
            period,
            interval: None,
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[async_trait]
impl<S: PcmSink> PcmSink for PacedSink<S> {
    async fn write(&mut self, block: &[u8]) -> Result<(), TransportError> {
        let period = self.period;
        let interval = self.interval.get_or_insert_with(|| {
            let mut i = tokio::time::interval(period);
            i.set_missed_tick_behavior(MissedTickBehavior::Skip);
            i
        });
        interval.tick().await;
        trace!("paced write of {} bytes", block.len());
        self.inner.write(block).await
    }

    async fn flush(&mut self) -> Result<(), TransportError> {
        self.inner.flush().await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.interval = None;
        self.inner.close().await
    }
}

#[async_trait]
impl PcmSink for Box<dyn PcmSink> {
    async fn write(&mut self, block: &[u8]) -> Result<(), TransportError> {
        (**self).write(block).await
    }

    async fn flush(&mut self) -> Result<(), TransportError> {
        (**self).flush().await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        (**self).close().await
    }
}
