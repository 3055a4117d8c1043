//! Turns a playback locator into a decoded [`PcmSource`].

use std::{
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::{Path, PathBuf},
    sync::Arc,
};

use tracing::{debug, warn};

use super::{AudioSource, PcmSource, http::HttpSource};
use crate::{
    audio::{decoder::SymphoniaSource, demux::detect_format, source::http::create_client},
    common::{
        errors::{LoadError, PipelineError},
        types::AudioFormat,
    },
};

/// Where a track's audio comes from.
///
/// When more than one field is set the first non-empty one in the order
/// `uri`, `device_id`, `file_path` decides; the others are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLocator {
    pub uri: Option<String>,
    pub device_id: Option<String>,
    pub file_path: Option<PathBuf>,
}

impl SourceLocator {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn uri(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            ..Default::default()
        }
    }

    pub fn device(id: impl Into<String>) -> Self {
        Self {
            device_id: Some(id.into()),
            ..Default::default()
        }
    }
}

/// Opens live capture devices (microphones, loopback) as PCM sources.
pub trait CaptureProvider: Send + Sync {
    fn open(&self, device_id: &str) -> Result<Box<dyn PcmSource>, PipelineError>;
}

/// Resolves locators to sources. Called off the async runtime, so
/// implementations may block.
pub trait SourceResolver: Send + Sync {
    fn resolve(&self, locator: &SourceLocator) -> Result<Box<dyn PcmSource>, LoadError>;
}

/// Local files, `file://` and `http(s)://` URIs, and capture devices through
/// an optional [`CaptureProvider`].
pub struct DefaultResolver {
    client: Option<reqwest::Client>,
    capture: Option<Arc<dyn CaptureProvider>>,
}

impl DefaultResolver {
    pub fn new() -> Self {
        let client = match create_client() {
            Ok(c) => Some(c),
            Err(e) => {
                warn!("HTTP client unavailable, URI sources disabled: {e}");
                None
            }
        };
        Self {
            client,
            capture: None,
        }
    }

    pub fn with_capture(mut self, provider: Arc<dyn CaptureProvider>) -> Self {
        self.capture = Some(provider);
        self
    }

    fn open_uri(&self, uri: &str) -> Result<Box<dyn PcmSource>, LoadError> {
        if let Some(path) = uri.strip_prefix("file://") {
            return open_file(Path::new(path));
        }

        if !(uri.starts_with("http://") || uri.starts_with("https://")) {
            return Err(LoadError::SourceUnavailable(format!(
                "unsupported uri scheme: {uri}"
            )));
        }

        let client = self
            .client
            .clone()
            .ok_or_else(|| LoadError::SourceUnavailable("no http client".into()))?;
        let source = HttpSource::open(client, uri)
            .map_err(|e| LoadError::SourceUnavailable(format!("{uri}: {e}")))?;

        let kind = source
            .content_type()
            .map(|mime| AudioFormat::from_mime(&mime))
            .filter(|k| *k != AudioFormat::Unknown)
            .unwrap_or_else(|| AudioFormat::from_path(uri));

        debug!("resolved {uri} as {:?}", kind);
        Ok(Box::new(SymphoniaSource::open(Box::new(source), Some(kind))?))
    }

    fn open_device(&self, device_id: &str) -> Result<Box<dyn PcmSource>, LoadError> {
        let provider = self.capture.as_ref().ok_or_else(|| {
            LoadError::SourceUnavailable(format!("no capture provider for device {device_id}"))
        })?;
        Ok(provider.open(device_id)?)
    }
}

impl Default for DefaultResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceResolver for DefaultResolver {
    fn resolve(&self, locator: &SourceLocator) -> Result<Box<dyn PcmSource>, LoadError> {
        if let Some(uri) = locator.uri.as_deref().filter(|u| !u.trim().is_empty()) {
            self.open_uri(uri)
        } else if let Some(id) = locator.device_id.as_deref().filter(|d| !d.is_empty()) {
            self.open_device(id)
        } else if let Some(path) = &locator.file_path {
            open_file(path)
        } else {
            Err(LoadError::SourceUnavailable("empty locator".into()))
        }
    }
}

fn open_file(path: &Path) -> Result<Box<dyn PcmSource>, LoadError> {
    if !path.is_file() {
        return Err(LoadError::SourceUnavailable(format!(
            "{} does not exist",
            path.display()
        )));
    }

    let mut file = File::open(path).map_err(PipelineError::from)?;
    let mut kind = AudioFormat::from_path(&path.to_string_lossy());
    if kind == AudioFormat::Unknown {
        kind = sniff(&mut file).map_err(PipelineError::from)?;
    }

    Ok(Box::new(SymphoniaSource::open(Box::new(file), Some(kind))?))
}

fn sniff(file: &mut File) -> std::io::Result<AudioFormat> {
    let mut header = [0u8; 12];
    let n = file.read(&mut header)?;
    file.seek(SeekFrom::Start(0))?;
    Ok(detect_format(&header[..n]))
}
