use crate::audio::constants::{BIT_DEPTH, BLOCK_SIZE, CHANNELS, FRAME_DURATION_MS, TARGET_SAMPLE_RATE};

const GREEN: &str = "\x1b[32m";
const CYAN: &str = "\x1b[36m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";

/// Build and output details shown at startup.
pub struct BannerInfo {
    pub version: &'static str,
    pub branch: &'static str,
    pub commit: &'static str,
    pub profile: &'static str,
    /// Where blocks end up, e.g. the dump file path.
    pub sink: String,
}

impl BannerInfo {
    pub fn new(sink: impl Into<String>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            branch: option_env!("GIT_BRANCH").unwrap_or("unknown"),
            commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
            profile: if cfg!(debug_assertions) { "debug" } else { "release" },
            sink: sink.into(),
        }
    }

    fn rows(&self) -> Vec<(&'static str, String, &'static str)> {
        let format = format!(
            "{} Hz, {} ch, s{}le, {} B per {} ms",
            TARGET_SAMPLE_RATE, CHANNELS, BIT_DEPTH, BLOCK_SIZE, FRAME_DURATION_MS
        );
        vec![
            ("Version", format!("{} ({}@{})", self.version, self.branch, self.commit), CYAN),
            ("Profile", self.profile.to_string(), YELLOW),
            ("Output", format, RESET),
            ("Sink", self.sink.clone(), RESET),
        ]
    }
}

pub fn print_banner(info: &BannerInfo) {
    println!();
    println!("{GREEN}{BOLD}  voxboard{RESET} {DIM}soundboard voice engine{RESET}");
    println!("{DIM}========================================{RESET}");
    for (label, value, colour) in info.rows() {
        println!("  {BOLD}{label:<10}{RESET}{colour}{value}{RESET}");
    }
    println!();
}
