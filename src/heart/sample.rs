/// Heart-rate samples and their JSON-lines encoding
///
/// On the wire a sample is `[time_ns, rate, [rr, ...]]`; the RR list may be
/// omitted. A live socket starts with a backlog object `{"last": [...]}`.
use serde::{Deserialize, Serialize};

use crate::error::HeartError;

pub const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// One heart-rate reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SampleRecord", into = "SampleRecord")]
pub struct HeartSample {
    /// UNIX timestamp in nanoseconds
    pub time: i64,
    /// Beats per minute
    pub rate: f64,
    /// RR intervals reported with this reading
    pub rr: Vec<f64>,
}

impl HeartSample {
    pub fn new(time: i64, rate: f64) -> Self {
        Self {
            time,
            rate,
            rr: Vec::new(),
        }
    }

    pub fn with_rr(mut self, rr: Vec<f64>) -> Self {
        self.rr = rr;
        self
    }

    /// Seconds elapsed from `earlier` to this sample
    pub fn seconds_since(&self, earlier: &HeartSample) -> f64 {
        (self.time - earlier.time) as f64 / NANOS_PER_SECOND
    }

    /// Parse one JSON-lines record
    pub fn parse(line: &str) -> Result<Self, HeartError> {
        serde_json::from_str(line).map_err(|source| HeartError::Malformed {
            line: line.trim().to_string(),
            source,
        })
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum SampleRecord {
    Full(i64, f64, Vec<f64>),
    Short(i64, f64),
}

impl From<SampleRecord> for HeartSample {
    fn from(record: SampleRecord) -> Self {
        match record {
            SampleRecord::Full(time, rate, rr) => Self { time, rate, rr },
            SampleRecord::Short(time, rate) => Self::new(time, rate),
        }
    }
}

impl From<HeartSample> for SampleRecord {
    fn from(sample: HeartSample) -> Self {
        SampleRecord::Full(sample.time, sample.rate, sample.rr)
    }
}

/// First line sent by a live heart-rate socket
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Backlog {
    pub last: Vec<HeartSample>,
}

impl Backlog {
    pub fn parse(line: &str) -> Result<Self, HeartError> {
        serde_json::from_str(line).map_err(|source| HeartError::Malformed {
            line: line.trim().to_string(),
            source,
        })
    }
}
