use serde::{Deserialize, Serialize};

/// Settings for the raw PCM dump transport used by the bundled binary.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TransportConfig {
    #[serde(default = "default_dump_path")]
    pub dump_path: String,
    /// Opaque credential handed to `connect_server`.
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub channel_id: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            dump_path: default_dump_path(),
            token: String::new(),
            channel_id: 0,
        }
    }
}

fn default_dump_path() -> String {
    "voxboard.pcm".to_string()
}
