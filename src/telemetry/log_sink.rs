//! Lazily opened statistics log
//!
//! The file is created on the first written line. Any open, write or flush
//! failure switches the sink to stdout for the rest of its life, re-emitting
//! the lines still buffered for the file.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
enum SinkState {
    Unopened,
    File(BufWriter<File>),
    Stdout,
    Closed,
}

/// Append-only line writer owned by one statistics instance
#[derive(Debug)]
pub(crate) struct LogSink {
    path: PathBuf,
    state: Mutex<SinkState>,
}

impl LogSink {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            state: Mutex::new(SinkState::Unopened),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append one line, opening the file on first use
    ///
    /// Each line is flushed before returning so a failing device is noticed
    /// while the line is still buffered and can go to stdout instead.
    pub fn write_line(&self, line: &str) {
        let mut state = self.lock();
        if matches!(*state, SinkState::Unopened) {
            *state = self.open();
        }

        let failure = match &mut *state {
            SinkState::File(writer) => match writeln!(writer, "{}", line) {
                Err(e) => Some((e, true)),
                Ok(()) => writer.flush().err().map(|e| (e, false)),
            },
            SinkState::Stdout => {
                println!("{}", line);
                None
            }
            SinkState::Unopened | SinkState::Closed => None,
        };

        if let Some((e, line_lost)) = failure {
            self.fall_back(&mut state, &e);
            if line_lost {
                println!("{}", line);
            }
        }
    }

    /// Switch to stdout, re-emitting whatever the file writer still buffers
    fn fall_back(&self, state: &mut SinkState, error: &std::io::Error) {
        log::warn!(
            "Statistics log {} failed ({}), falling back to stdout",
            self.path.display(),
            error
        );
        if let SinkState::File(writer) = std::mem::replace(state, SinkState::Stdout) {
            let (_file, buffered) = writer.into_parts();
            if let Ok(pending) = buffered {
                print!("{}", String::from_utf8_lossy(&pending));
            }
        }
    }

    fn open(&self) -> SinkState {
        if let Some(parent) = self.path.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            log::warn!(
                "Cannot create statistics directory {}: {}",
                parent.display(),
                e
            );
            return SinkState::Stdout;
        }

        match fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
        {
            Ok(file) => {
                log::debug!("Statistics log opened at {}", self.path.display());
                SinkState::File(BufWriter::new(file))
            }
            Err(e) => {
                log::warn!(
                    "Cannot open statistics log {}: {}, using stdout",
                    self.path.display(),
                    e
                );
                SinkState::Stdout
            }
        }
    }

    /// Flush pending lines; a later write reopens nothing
    pub fn close(&self) {
        let mut state = self.lock();
        self.flush_locked(&mut state);
        *state = SinkState::Closed;
    }

    pub fn flush(&self) {
        let mut state = self.lock();
        self.flush_locked(&mut state);
    }

    fn flush_locked(&self, state: &mut SinkState) {
        let flushed = match &mut *state {
            SinkState::File(writer) => writer.flush(),
            _ => Ok(()),
        };
        if let Err(e) = flushed {
            self.fall_back(state, &e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_created_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("stats.log");
        let sink = LogSink::new(path.clone());
        assert!(!path.exists());

        sink.write_line("first");
        sink.write_line("second");
        sink.close();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "first\nsecond\n");
    }

    #[test]
    fn test_writes_after_close_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.log");
        let sink = LogSink::new(path.clone());
        sink.close();
        sink.write_line("ignored");
        assert!(!path.exists());
    }

    #[test]
    fn test_unwritable_location_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"file, not a directory").unwrap();

        let sink = LogSink::new(blocker.join("stats.log"));
        sink.write_line("goes to stdout");
        sink.close();
        assert!(!blocker.join("stats.log").exists());
        assert!(matches!(*sink.lock(), SinkState::Closed));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_full_device_falls_back_to_stdout() {
        let sink = LogSink::new(PathBuf::from("/dev/full"));
        sink.write_line("summary line");
        assert!(matches!(*sink.lock(), SinkState::Stdout));

        sink.write_line("next line");
        sink.flush();
        assert!(matches!(*sink.lock(), SinkState::Stdout));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_flush_failure_switches_to_stdout() {
        let sink = LogSink::new(PathBuf::from("/dev/full"));
        *sink.lock() = sink.open();
        if let SinkState::File(writer) = &mut *sink.lock() {
            writer.write_all(b"buffered summary\n").unwrap();
        }

        sink.flush();
        assert!(matches!(*sink.lock(), SinkState::Stdout));
    }
}
