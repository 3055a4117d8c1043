use std::sync::Arc;

use parking_lot::Mutex;

/// A thread-safe, mutually exclusive shared component.
pub type Shared<T> = Arc<Mutex<T>>;

/// A generic boxed error type.
pub type AnyError = Box<dyn std::error::Error + Send + Sync>;

/// A convenient Result alias returning `AnyError`.
pub type AnyResult<T> = std::result::Result<T, AnyError>;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

id_type!(
    /// Voice channel identifier as handed out by the gateway.
    ChannelId
);
id_type!(
    /// Server identifier, used when listing channels.
    GuildId
);

/// Supported audio containers, used as a probe hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Aac,
    Opus,
    Webm,
    Mp4,
    Mp3,
    Ogg,
    Flac,
    Wav,
    Unknown,
}

impl AudioFormat {
    pub fn as_ext(&self) -> &'static str {
        match self {
            Self::Aac => "aac",
            Self::Opus => "opus",
            Self::Webm => "webm",
            Self::Mp4 => "mp4",
            Self::Mp3 => "mp3",
            Self::Ogg => "ogg",
            Self::Flac => "flac",
            Self::Wav => "wav",
            Self::Unknown => "",
        }
    }

    pub fn as_mime(&self) -> Option<&'static str> {
        match self {
            Self::Aac => Some("audio/aac"),
            Self::Opus | Self::Ogg => Some("audio/ogg"),
            Self::Webm => Some("audio/webm"),
            Self::Mp4 => Some("audio/mp4"),
            Self::Mp3 => Some("audio/mpeg"),
            Self::Flac => Some("audio/flac"),
            Self::Wav => Some("audio/wav"),
            Self::Unknown => None,
        }
    }

    pub fn from_ext(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "aac" => Self::Aac,
            "opus" => Self::Opus,
            "webm" => Self::Webm,
            "mp4" | "m4a" => Self::Mp4,
            "mp3" => Self::Mp3,
            "ogg" => Self::Ogg,
            "flac" => Self::Flac,
            "wav" => Self::Wav,
            _ => Self::Unknown,
        }
    }

    /// Guess the container from a path or URL, ignoring any query string.
    pub fn from_path(path: &str) -> Self {
        std::path::Path::new(path.split('?').next().unwrap_or(path))
            .extension()
            .and_then(|s| s.to_str())
            .map(Self::from_ext)
            .unwrap_or(Self::Unknown)
    }

    /// Map an HTTP `Content-Type` header onto a container.
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.split(';').next().unwrap_or(mime).trim();
        match mime {
            "audio/mpeg" | "audio/mp3" => Self::Mp3,
            "audio/ogg" | "application/ogg" => Self::Ogg,
            "audio/opus" => Self::Opus,
            "audio/webm" => Self::Webm,
            "audio/mp4" | "audio/x-m4a" => Self::Mp4,
            "audio/aac" | "audio/aacp" => Self::Aac,
            "audio/flac" | "audio/x-flac" => Self::Flac,
            "audio/wav" | "audio/x-wav" | "audio/wave" => Self::Wav,
            _ => Self::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_path_ignores_query() {
        assert_eq!(AudioFormat::from_path("https://a.b/c/song.mp3?x=1"), AudioFormat::Mp3);
        assert_eq!(AudioFormat::from_path("/tmp/clip.M4A"), AudioFormat::Mp4);
        assert_eq!(AudioFormat::from_path("noext"), AudioFormat::Unknown);
    }

    #[test]
    fn format_from_mime_strips_parameters() {
        assert_eq!(AudioFormat::from_mime("audio/ogg; codecs=opus"), AudioFormat::Ogg);
        assert_eq!(AudioFormat::from_mime("text/html"), AudioFormat::Unknown);
    }
}
