use std::{io, sync::Arc, thread, time::Duration};

use parking_lot::{Condvar, Mutex};
use tokio::runtime::Handle;
use tracing::{debug, warn};

use super::{FetchError, fetch_range};
use crate::audio::constants::{
    HTTP_FETCH_CHUNK_LIMIT, HTTP_PREFETCH_BUFFER_SIZE, HTTP_SOCKET_SKIP_LIMIT, MAX_FETCH_RETRIES,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Continue,
    Seek(u64),
    Stop,
}

struct State {
    /// Bytes fetched ahead of the reader.
    buffer: Vec<u8>,
    /// The reader is waiting, or the buffer is below its cap.
    wanted: bool,
    at_end: bool,
    command: Command,
    error: Option<String>,
}

/// Reader-side handle on the bytes a background worker fetches ahead.
#[derive(Clone)]
pub struct Prefetch {
    shared: Arc<(Mutex<State>, Condvar)>,
}

impl Prefetch {
    fn new() -> Self {
        Self {
            shared: Arc::new((
                Mutex::new(State {
                    buffer: Vec::new(),
                    wanted: true,
                    at_end: false,
                    command: Command::Continue,
                    error: None,
                }),
                Condvar::new(),
            )),
        }
    }

    /// Move the next run of fetched bytes into `into`, blocking until there
    /// is some. Returns `false` at the end of the stream.
    pub fn next_chunk(&self, into: &mut Vec<u8>) -> io::Result<bool> {
        let (lock, cvar) = &*self.shared;
        let mut state = lock.lock();
        state.wanted = true;
        cvar.notify_all();

        while state.buffer.is_empty() && !state.at_end && state.error.is_none() {
            cvar.wait(&mut state);
        }
        if state.buffer.is_empty() {
            return match &state.error {
                Some(err) => Err(io::Error::other(err.clone())),
                None => Ok(false),
            };
        }

        into.clear();
        std::mem::swap(into, &mut state.buffer);
        state.wanted = true;
        cvar.notify_all();
        Ok(true)
    }

    /// Hand over the buffered bytes if they reach at least `skip` bytes ahead.
    pub fn take_covering(&self, skip: u64, into: &mut Vec<u8>) -> bool {
        let (lock, cvar) = &*self.shared;
        let mut state = lock.lock();
        if (state.buffer.len() as u64) < skip {
            return false;
        }
        into.clear();
        std::mem::swap(into, &mut state.buffer);
        state.wanted = true;
        cvar.notify_all();
        true
    }

    /// Drop everything buffered and refetch from `pos`.
    pub fn seek(&self, pos: u64) {
        let (lock, cvar) = &*self.shared;
        let mut state = lock.lock();
        state.buffer.clear();
        state.command = Command::Seek(pos);
        state.at_end = false;
        state.error = None;
        state.wanted = true;
        cvar.notify_all();
    }

    pub fn stop(&self) {
        let (lock, cvar) = &*self.shared;
        lock.lock().command = Command::Stop;
        cvar.notify_all();
    }

    /// Park the worker until there is work. `None` means stop.
    fn wait_for_work(&self) -> Option<Option<u64>> {
        let (lock, cvar) = &*self.shared;
        let mut state = lock.lock();
        while !state.wanted
            && state.command == Command::Continue
            && state.buffer.len() >= HTTP_PREFETCH_BUFFER_SIZE
        {
            cvar.wait(&mut state);
        }

        match std::mem::replace(&mut state.command, Command::Continue) {
            Command::Stop => None,
            Command::Seek(pos) => Some(Some(pos)),
            Command::Continue => Some(None),
        }
    }

    fn push(&self, bytes: &[u8]) -> bool {
        let (lock, cvar) = &*self.shared;
        let mut state = lock.lock();
        if state.command != Command::Continue {
            return false;
        }
        state.buffer.extend_from_slice(bytes);
        if state.buffer.len() >= HTTP_PREFETCH_BUFFER_SIZE {
            state.wanted = false;
        }
        cvar.notify_all();
        true
    }

    /// Flag the end of the stream and wait for a seek back or a stop.
    fn park_at_end(&self) {
        let (lock, cvar) = &*self.shared;
        let mut state = lock.lock();
        state.at_end = true;
        cvar.notify_all();
        while state.command == Command::Continue {
            cvar.wait(&mut state);
        }
    }

    fn fail(&self, err: String) {
        let (lock, cvar) = &*self.shared;
        lock.lock().error = Some(err);
        cvar.notify_all();
    }
}

/// Start the fetch thread. `response` is the already open first request.
pub fn spawn_prefetcher(
    client: reqwest::Client,
    url: String,
    response: reqwest::Response,
    len: Option<u64>,
    handle: Handle,
) -> io::Result<Prefetch> {
    let prefetch = Prefetch::new();
    let mut worker = Worker {
        prefetch: prefetch.clone(),
        client,
        url,
        pos: 0,
        response: Some(response),
        len,
        handle,
        retries: 0,
    };
    thread::Builder::new()
        .name("http-prefetch".to_string())
        .spawn(move || worker.run())?;
    Ok(prefetch)
}

struct Worker {
    prefetch: Prefetch,
    client: reqwest::Client,
    url: String,
    pos: u64,
    response: Option<reqwest::Response>,
    len: Option<u64>,
    handle: Handle,
    retries: usize,
}

impl Worker {
    fn run(&mut self) {
        while let Some(seek) = self.prefetch.wait_for_work() {
            if let Some(pos) = seek {
                self.reposition(pos);
            }
            if self.response.is_none() && !self.connect() {
                break;
            }
            if !self.pump() {
                break;
            }
        }
        debug!("prefetch for {} stopped", self.url);
    }

    /// Short forward jumps drain the open response; anything else reconnects.
    fn reposition(&mut self, pos: u64) {
        let ahead = pos.saturating_sub(self.pos);
        let response = self.response.take();
        if let Some(res) = response.filter(|_| ahead > 0 && ahead <= HTTP_SOCKET_SKIP_LIMIT) {
            debug!("prefetch: skipping {} bytes on the open response", ahead);
            if let Some((res, spill)) = self.drain(res, ahead) {
                self.prefetch.push(&spill);
                self.response = Some(res);
            }
        }
        self.pos = pos;
    }

    fn drain(&self, mut res: reqwest::Response, n: u64) -> Option<(reqwest::Response, Vec<u8>)> {
        self.handle.block_on(async move {
            let mut skipped = 0u64;
            let mut spill = Vec::new();
            while skipped < n {
                let chunk = res.chunk().await.ok()??;
                let take = (n - skipped).min(chunk.len() as u64);
                skipped += take;
                spill.extend_from_slice(&chunk[take as usize..]);
            }
            Some((res, spill))
        })
    }

    /// Returns `false` once retries are exhausted.
    fn connect(&mut self) -> bool {
        let fetched = self.handle.block_on(fetch_range(
            &self.client,
            &self.url,
            self.pos,
            Some(HTTP_FETCH_CHUNK_LIMIT),
        ));
        match fetched {
            Ok(res) => {
                self.response = Some(res);
                self.retries = 0;
                true
            }
            Err(FetchError::PastEnd) => {
                debug!("prefetch: range starts past the end");
                self.prefetch.park_at_end();
                true
            }
            Err(e) => self.retry(e.to_string(), 500),
        }
    }

    /// Move one network chunk into the shared buffer.
    fn pump(&mut self) -> bool {
        let Some(res) = self.response.as_mut() else {
            return true;
        };
        match self.handle.block_on(res.chunk()) {
            Ok(Some(bytes)) => {
                if self.prefetch.push(&bytes) {
                    self.pos += bytes.len() as u64;
                }
                self.retries = 0;
                true
            }
            Ok(None) => {
                self.response = None;
                self.retries = 0;
                if self.len.is_none_or(|len| self.pos >= len) {
                    self.prefetch.park_at_end();
                }
                true
            }
            Err(e) => {
                self.response = None;
                self.retry(e.to_string(), 100)
            }
        }
    }

    fn retry(&mut self, err: String, backoff_ms: u64) -> bool {
        self.retries += 1;
        if self.retries > MAX_FETCH_RETRIES {
            warn!("prefetch for {} gave up: {}", self.url, err);
            self.prefetch.fail(err);
            return false;
        }
        warn!(
            "prefetch for {} failed (attempt {}/{}): {}",
            self.url, self.retries, MAX_FETCH_RETRIES, err
        );
        thread::sleep(Duration::from_millis(backoff_ms * self.retries as u64));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_sees_pushed_bytes_then_end() {
        let prefetch = Prefetch::new();
        assert!(prefetch.push(&[1, 2, 3]));

        let mut chunk = Vec::new();
        assert!(prefetch.next_chunk(&mut chunk).unwrap());
        assert_eq!(chunk, vec![1, 2, 3]);

        let worker = prefetch.clone();
        let t = thread::spawn(move || {
            let (lock, cvar) = &*worker.shared;
            lock.lock().at_end = true;
            cvar.notify_all();
        });
        assert!(!prefetch.next_chunk(&mut chunk).unwrap());
        t.join().unwrap();
    }

    #[test]
    fn failure_surfaces_as_io_error() {
        let prefetch = Prefetch::new();
        prefetch.fail("boom".into());
        let mut chunk = Vec::new();
        assert!(prefetch.next_chunk(&mut chunk).is_err());
    }

    #[test]
    fn seek_discards_buffer_and_blocks_pushes_until_taken() {
        let prefetch = Prefetch::new();
        prefetch.push(&[9; 16]);
        prefetch.seek(100);
        assert!(!prefetch.push(&[1]));
        assert_eq!(prefetch.wait_for_work(), Some(Some(100)));
        assert!(prefetch.push(&[1]));
    }

    #[test]
    fn covering_take_needs_enough_bytes() {
        let prefetch = Prefetch::new();
        prefetch.push(&[0; 8]);
        let mut chunk = Vec::new();
        assert!(!prefetch.take_covering(9, &mut chunk));
        assert!(prefetch.take_covering(8, &mut chunk));
        assert_eq!(chunk.len(), 8);
    }
}
