use std::{
    collections::VecDeque,
    fs::{self, File, OpenOptions},
    io::{self, BufRead, BufReader, Write},
    path::PathBuf,
    sync::Arc,
};

use parking_lot::Mutex;

/// Drop ANSI escape sequences so the log file stays plain text.
pub fn strip_ansi_escapes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\x1b' {
            out.push(c);
            continue;
        }
        // skip up to and including the final letter of the sequence
        for c in chars.by_ref() {
            if c.is_ascii_alphabetic() {
                break;
            }
        }
    }
    out
}

struct LogFile {
    file: Option<File>,
    unpruned: u32,
}

/// Append-only log file capped at roughly `max_lines`.
///
/// The oldest lines are dropped in batches, so the file may briefly hold up
/// to a tenth more than the cap.
#[derive(Clone)]
pub(crate) struct TrimmedFileWriter {
    path: PathBuf,
    max_lines: usize,
    inner: Arc<Mutex<LogFile>>,
}

impl TrimmedFileWriter {
    pub fn new(path: impl Into<PathBuf>, max_lines: u32) -> Self {
        Self {
            path: path.into(),
            max_lines: max_lines.max(1) as usize,
            inner: Arc::new(Mutex::new(LogFile {
                file: None,
                unpruned: 0,
            })),
        }
    }

    fn batch(&self) -> u32 {
        (self.max_lines as u32 / 10).max(50)
    }

    /// Rewrite the file with only its newest `max_lines` lines.
    fn prune(&self) -> io::Result<()> {
        let reader = match File::open(&self.path) {
            Ok(f) => BufReader::new(f),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        let mut tail = VecDeque::with_capacity(self.max_lines + 1);
        for line in reader.lines() {
            if tail.len() == self.max_lines {
                tail.pop_front();
            }
            tail.push_back(line?);
        }

        let mut joined = tail.into_iter().collect::<Vec<_>>().join("\n");
        joined.push('\n');
        fs::write(&self.path, joined)
    }
}

impl Write for TrimmedFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut log = self.inner.lock();
        if log.file.is_none() {
            log.file = Some(OpenOptions::new().create(true).append(true).open(&self.path)?);
        }
        if let Some(file) = log.file.as_mut() {
            file.write_all(buf)?;
        }

        log.unpruned += buf.iter().filter(|&&b| b == b'\n').count() as u32;
        if log.unpruned >= self.batch() {
            // the append handle must be reopened after the rewrite
            log.file = None;
            log.unpruned = 0;
            if let Err(e) = self.prune() {
                eprintln!("log pruning failed: {}", e);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.inner.lock().file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for TrimmedFileWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_colour_codes() {
        assert_eq!(strip_ansi_escapes("\x1b[32mINFO\x1b[0m ok"), "INFO ok");
        assert_eq!(strip_ansi_escapes("plain"), "plain");
    }

    #[test]
    fn keeps_only_the_newest_lines() {
        let path = std::env::temp_dir().join(format!("voxboard-log-{}.log", uuid::Uuid::new_v4()));
        let mut writer = TrimmedFileWriter::new(&path, 10);
        for i in 0..120 {
            writer.write_all(format!("line {i}\n").as_bytes()).unwrap();
        }
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert!(lines.len() <= 60, "kept {} lines", lines.len());
        assert_eq!(lines.last().copied(), Some("line 119"));
        let _ = std::fs::remove_file(path);
    }
}
