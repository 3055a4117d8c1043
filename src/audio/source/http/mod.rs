use std::{
    io::{self, Read, Seek, SeekFrom},
    time::Duration,
};

use reqwest::{
    StatusCode,
    header::{ACCEPT, ACCEPT_ENCODING, CONTENT_RANGE, CONTENT_TYPE, HeaderMap, RANGE},
};
use symphonia::core::io::MediaSource;
use thiserror::Error;
use tracing::{debug, info};

use super::AudioSource;
use crate::{
    audio::constants::{HTTP_INITIAL_BUF_CAPACITY, HTTP_TIMEOUT_SECS},
    common::types::AnyResult,
};

pub mod prefetcher;
use prefetcher::{Prefetch, spawn_prefetcher};

/// Build the client used for URI sources.
pub fn create_client() -> AnyResult<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("voxboard/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()?;
    Ok(client)
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("requested range starts past the end of the stream")]
    PastEnd,
    #[error("{url} answered {status}")]
    Status { url: String, status: StatusCode },
    #[error(transparent)]
    Request(#[from] reqwest::Error),
}

fn range_header(offset: u64, limit: Option<u64>) -> String {
    match limit {
        Some(n) if n > 0 => format!("bytes={}-{}", offset, offset + n - 1),
        _ => format!("bytes={}-", offset),
    }
}

/// GET `url` from `offset`, at most `limit` bytes.
pub(crate) async fn fetch_range(
    client: &reqwest::Client,
    url: &str,
    offset: u64,
    limit: Option<u64>,
) -> Result<reqwest::Response, FetchError> {
    let res = client
        .get(url)
        .header(ACCEPT, "*/*")
        .header(ACCEPT_ENCODING, "identity")
        .header(RANGE, range_header(offset, limit))
        .send()
        .await?;

    match res.status() {
        s if s.is_success() => Ok(res),
        StatusCode::RANGE_NOT_SATISFIABLE => Err(FetchError::PastEnd),
        status => Err(FetchError::Status {
            url: url.to_string(),
            status,
        }),
    }
}

/// What the first response says about the whole resource.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct StreamInfo {
    len: Option<u64>,
    content_type: Option<String>,
}

impl StreamInfo {
    fn from_headers(headers: &HeaderMap, content_length: Option<u64>) -> Self {
        let text = |name| headers.get(name).and_then(|v| v.to_str().ok());
        // "bytes 0-99/1234" carries the full size; Content-Length only the part.
        let total = text(CONTENT_RANGE)
            .and_then(|v| v.rsplit('/').next())
            .and_then(|v| v.parse::<u64>().ok());
        Self {
            len: total.or(content_length),
            content_type: text(CONTENT_TYPE).map(str::to_string),
        }
    }
}

/// Byte stream over HTTP range requests, filled by a background thread.
///
/// Opening blocks on the current tokio runtime, so call it from a blocking
/// context such as `spawn_blocking`.
pub struct HttpSource {
    pos: u64,
    info: StreamInfo,
    chunk: Vec<u8>,
    offset: usize,
    prefetch: Prefetch,
}

impl HttpSource {
    pub fn open(client: reqwest::Client, url: &str) -> AnyResult<Self> {
        let handle = tokio::runtime::Handle::try_current()?;
        let response = handle.block_on(fetch_range(&client, url, 0, None))?;
        let info = StreamInfo::from_headers(response.headers(), response.content_length());
        info!("opened {} (len={:?})", url, info.len);

        let prefetch = spawn_prefetcher(client, url.to_string(), response, info.len, handle)?;
        Ok(Self {
            pos: 0,
            info,
            chunk: Vec::with_capacity(HTTP_INITIAL_BUF_CAPACITY),
            offset: 0,
            prefetch,
        })
    }

    fn unread(&self) -> u64 {
        (self.chunk.len() - self.offset) as u64
    }

    fn target(&self, pos: SeekFrom) -> io::Result<u64> {
        match pos {
            SeekFrom::Start(p) => Ok(p),
            SeekFrom::Current(delta) => Ok(self.pos.saturating_add_signed(delta)),
            SeekFrom::End(delta) => self
                .info
                .len
                .map(|len| len.saturating_add_signed(delta))
                .ok_or_else(|| io::Error::new(io::ErrorKind::Unsupported, "length unknown")),
        }
    }
}

impl AudioSource for HttpSource {
    fn content_type(&self) -> Option<String> {
        self.info.content_type.clone()
    }
}

impl Read for HttpSource {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.unread() == 0 {
            self.offset = 0;
            if !self.prefetch.next_chunk(&mut self.chunk)? {
                return Ok(0);
            }
        }
        let n = out.len().min(self.chunk.len() - self.offset);
        out[..n].copy_from_slice(&self.chunk[self.offset..self.offset + n]);
        self.offset += n;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for HttpSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = self.target(pos)?;
        if target == self.pos {
            return Ok(target);
        }

        let ahead = target.saturating_sub(self.pos);
        let held = self.unread();
        if ahead > 0 && ahead <= held {
            self.offset += ahead as usize;
        } else if ahead > held && self.prefetch.take_covering(ahead - held, &mut self.chunk) {
            debug!("http seek +{} served from the prefetch buffer", ahead);
            self.offset = (ahead - held) as usize;
        } else {
            debug!("http seek {} -> {} refetches", self.pos, target);
            self.chunk.clear();
            self.offset = 0;
            self.prefetch.seek(target);
        }
        self.pos = target;
        Ok(target)
    }
}

impl MediaSource for HttpSource {
    fn is_seekable(&self) -> bool {
        self.info.len.is_some()
    }

    fn byte_len(&self) -> Option<u64> {
        self.info.len
    }
}

impl Drop for HttpSource {
    fn drop(&mut self) {
        self.prefetch.stop();
    }
}
