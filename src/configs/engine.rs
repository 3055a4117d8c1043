use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineConfig {
    /// Linear volume factor applied when boost is off. 1.0 is unity.
    #[serde(default = "default_volume")]
    pub volume: f32,
    /// Initial pitch factor. 1.0 leaves the pitch unchanged.
    #[serde(default = "default_pitch")]
    pub pitch: f32,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_health_check_interval_ms")]
    pub health_check_interval_ms: u64,
    #[serde(default = "default_command_queue")]
    pub command_queue: usize,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    /// Space sink writes at the 20 ms packet cadence.
    #[serde(default = "default_pace_output")]
    pub pace_output: bool,
}

impl EngineConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms.max(1))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            volume: default_volume(),
            pitch: default_pitch(),
            connect_timeout_ms: default_connect_timeout_ms(),
            health_check_interval_ms: default_health_check_interval_ms(),
            command_queue: default_command_queue(),
            event_capacity: default_event_capacity(),
            pace_output: default_pace_output(),
        }
    }
}

fn default_volume() -> f32 {
    1.0
}

fn default_pitch() -> f32 {
    1.0
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_health_check_interval_ms() -> u64 {
    1_000
}

fn default_command_queue() -> usize {
    64
}

fn default_event_capacity() -> usize {
    256
}

fn default_pace_output() -> bool {
    true
}
