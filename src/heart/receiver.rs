/// Heart-rate sample sources
///
/// A path ending in `.socket` is a live Unix socket fed by the heart-rate
/// monitor bridge; anything else is a replay file with one record per line.
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::HeartError;
use crate::runtime::{CancelToken, RetryPolicy};

use super::sample::{Backlog, HeartSample};

/// Poll interval for cancellation while waiting on a socket
const READ_POLL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq)]
pub enum HeartSource {
    Socket(PathBuf),
    File(PathBuf),
}

impl HeartSource {
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if path.extension().is_some_and(|ext| ext == "socket") {
            HeartSource::Socket(path.to_path_buf())
        } else {
            HeartSource::File(path.to_path_buf())
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            HeartSource::Socket(path) | HeartSource::File(path) => path,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, HeartSource::Socket(_))
    }

    /// Read samples until the source ends or `token` is cancelled.
    ///
    /// `on_sample` receives each sample and whether it came from the initial
    /// backlog. Malformed records are logged and skipped.
    pub fn run<F>(&self, token: &CancelToken, retry: RetryPolicy, mut on_sample: F) -> Result<(), HeartError>
    where
        F: FnMut(HeartSample, bool),
    {
        match self {
            HeartSource::File(path) => {
                let file = File::open(path).map_err(|source| HeartError::OpenFailed {
                    path: path.display().to_string(),
                    source,
                })?;
                tracing::info!("Replaying heart rate from {}", path.display());
                read_records(BufReader::new(file), token, false, &mut on_sample)
            }
            HeartSource::Socket(path) => {
                let what = format!("Connecting to {}", path.display());
                let Some(stream) = retry.run(token, &what, || UnixStream::connect(path)) else {
                    return Ok(());
                };
                stream
                    .set_read_timeout(Some(READ_POLL))
                    .map_err(HeartError::ReadFailed)?;
                tracing::info!("Connected to heart rate monitor at {}", path.display());
                read_records(BufReader::new(stream), token, true, &mut on_sample)
            }
        }
    }
}

fn read_records<R, F>(mut reader: BufReader<R>, token: &CancelToken, live: bool, on_sample: &mut F) -> Result<(), HeartError>
where
    R: Read,
    F: FnMut(HeartSample, bool),
{
    let mut line = Vec::new();

    if live {
        if !token.read_line(&mut reader, &mut line).map_err(HeartError::ReadFailed)? {
            return Ok(());
        }
        match Backlog::parse(&String::from_utf8_lossy(&line)) {
            Ok(backlog) => {
                tracing::debug!("Received backlog of {} samples", backlog.last.len());
                for sample in backlog.last {
                    on_sample(sample, true);
                }
            }
            Err(e) => tracing::error!("{:#}", anyhow::Error::from(e)),
        }
    }

    while token.read_line(&mut reader, &mut line).map_err(HeartError::ReadFailed)? {
        let text = String::from_utf8_lossy(&line);
        if text.trim().is_empty() {
            continue;
        }
        match HeartSample::parse(&text) {
            Ok(sample) => on_sample(sample, false),
            Err(e) => tracing::error!("{:#}", anyhow::Error::from(e)),
        }
    }
    Ok(())
}

/// Read a whole replay file eagerly, skipping malformed lines
pub fn read_file(path: &Path) -> Result<Vec<HeartSample>, HeartError> {
    let file = File::open(path).map_err(|source| HeartError::OpenFailed {
        path: path.display().to_string(),
        source,
    })?;
    let mut samples = Vec::new();
    for line in BufReader::new(file).lines() {
        let line: String = line.map_err(HeartError::ReadFailed)?;
        if line.trim().is_empty() {
            continue;
        }
        match HeartSample::parse(&line) {
            Ok(sample) => samples.push(sample),
            Err(e) => tracing::error!("{:#}", anyhow::Error::from(e)),
        }
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::net::UnixListener;
    use tempfile::TempDir;

    #[test]
    fn test_source_from_path() {
        assert!(HeartSource::from_path("/run/heart.socket").is_live());
        assert!(!HeartSource::from_path("session.jsonl").is_live());
        assert_eq!(HeartSource::from_path("a.socket").path(), Path::new("a.socket"));
    }

    #[test]
    fn test_replay_file_skips_malformed_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.jsonl");
        std::fs::write(&path, "[1, 60, []]\nnot json\n\n[2, 61]\n[3, 62.5, [0.9]]").unwrap();

        let (_handle, token) = CancelToken::new();
        let mut seen = Vec::new();
        HeartSource::from_path(&path)
            .run(&token, RetryPolicy::fixed(Duration::from_millis(1)), |sample, backlog| {
                seen.push((sample.time, sample.rate, backlog));
            })
            .unwrap();

        assert_eq!(seen, vec![(1, 60.0, false), (2, 61.0, false), (3, 62.5, false)]);
        assert_eq!(read_file(&path).unwrap().len(), 3);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let (_handle, token) = CancelToken::new();
        let result = HeartSource::from_path("/nonexistent/heart.jsonl").run(
            &token,
            RetryPolicy::fixed(Duration::from_millis(1)),
            |_, _| {},
        );
        assert!(matches!(result, Err(HeartError::OpenFailed { .. })));
    }

    #[test]
    fn test_socket_backlog_then_live_samples() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("heart.socket");
        let listener = UnixListener::bind(&path).unwrap();

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(b"{\"last\": [[1, 60, []], [2, 61, []]]}\n").unwrap();
            stream.write_all(b"[3, 62, [0.95]]\n").unwrap();
        });

        let (_handle, token) = CancelToken::new();
        let mut seen = Vec::new();
        HeartSource::from_path(&path)
            .run(&token, RetryPolicy::fixed(Duration::from_millis(10)), |sample, backlog| {
                seen.push((sample.time, backlog));
            })
            .unwrap();
        server.join().unwrap();

        assert_eq!(seen, vec![(1, true), (2, true), (3, false)]);
    }

    #[test]
    fn test_unreachable_socket_gives_up_on_cancel() {
        let (handle, token) = CancelToken::new();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            drop(handle);
        });

        let result = HeartSource::from_path("/nonexistent/heart.socket").run(
            &token,
            RetryPolicy::fixed(Duration::from_millis(10)),
            |_, _| {},
        );
        canceller.join().unwrap();
        assert!(result.is_ok());
    }
}
