/// Recorded gyro streams
///
/// One JSON array per line: `[timestamp, x, y, z]`. Used to replay a session
/// through the detectors without a headband.
use serde::Deserialize;
use std::io::{self, BufRead};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
struct GyroFrame(f64, f64, f64, f64);

/// Frames read from a recording, in file order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GyroRecording {
    pub samples: Vec<[f64; 3]>,
    pub timestamps: Vec<f64>,
}

impl GyroRecording {
    /// Read every frame, skipping blank and malformed lines
    pub fn read(reader: impl BufRead) -> io::Result<Self> {
        let mut recording = Self::default();
        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<GyroFrame>(line) {
                Ok(GyroFrame(ts, x, y, z)) => {
                    recording.timestamps.push(ts);
                    recording.samples.push([x, y, z]);
                }
                Err(e) => tracing::error!("Skipping gyro frame {:?}: {}", line, e),
            }
        }
        Ok(recording)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Split into batches of at most `size` frames, as a headband would send them
    pub fn batches(&self, size: usize) -> impl Iterator<Item = (&[[f64; 3]], &[f64])> {
        let size = size.max(1);
        self.samples.chunks(size).zip(self.timestamps.chunks(size))
    }
}
