//! Telemetry records and their HTTP delivery.
//!
//! Records are posted as flat JSON objects to
//! `{base_url}/api/v1/{access_token}/telemetry?ts={unix_ms}`. Delivery
//! failures are reported to the caller; the counting loop logs them and
//! carries on.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server answered {0}")]
    Status(u16),

    #[error("request timeout {0} s is not a usable duration")]
    InvalidTimeout(f64),

    #[error("cannot read status file {path}: {source}")]
    StatusFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse status file {path}: {source}")]
    StatusParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One telemetry payload.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum TelemetryRecord {
    Extended {
        shrimp_total: u64,
        shrimp_current: u64,
        shrimp_small: u64,
        shrimp_medium: u64,
        shrimp_large: u64,
        shrimp_weight: f64,
        shrimp_total_weight: f64,
    },
    Environment {
        temperature: f64,
        humidity: f64,
    },
    Count {
        shrimp_count: usize,
    },
}

/// Destination for telemetry records.
pub trait TelemetrySink {
    fn send(&mut self, record: &TelemetryRecord, ts_ms: i64) -> Result<(), TelemetryError>;
}

/// Endpoint settings.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub base_url: String,
    pub access_token: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: f64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            base_url: "https://demo.thingsboard.io".to_string(),
            access_token: String::new(),
            timeout_secs: 3.0,
        }
    }
}

impl TelemetryConfig {
    pub fn endpoint(&self, ts_ms: i64) -> String {
        format!(
            "{}/api/v1/{}/telemetry?ts={}",
            self.base_url.trim_end_matches('/'),
            self.access_token,
            ts_ms
        )
    }
}

/// Blocking HTTP poster.
pub struct HttpReporter {
    config: TelemetryConfig,
    client: reqwest::blocking::Client,
}

impl HttpReporter {
    pub fn new(config: TelemetryConfig) -> Result<Self, TelemetryError> {
        let timeout = Duration::try_from_secs_f64(config.timeout_secs)
            .ok()
            .filter(|t| !t.is_zero())
            .ok_or(TelemetryError::InvalidTimeout(config.timeout_secs))?;
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { config, client })
    }
}

impl TelemetrySink for HttpReporter {
    fn send(&mut self, record: &TelemetryRecord, ts_ms: i64) -> Result<(), TelemetryError> {
        let url = self.config.endpoint(ts_ms);
        let response = self.client.post(&url).json(record).send()?;
        let status = response.status();
        tracing::debug!("telemetry {:?} -> {}", record, status);
        if !status.is_success() {
            return Err(TelemetryError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// When to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Frames 0, n, 2n, ...
    EveryNthFrame(u64),
    /// First frame, then whenever at least this long has passed.
    Interval(Duration),
}

impl Default for Cadence {
    fn default() -> Self {
        Cadence::EveryNthFrame(5)
    }
}

/// Frame-sampling state for a [`Cadence`].
#[derive(Debug, Clone)]
pub struct Sampler {
    cadence: Cadence,
    frame: u64,
    last_sent: Option<Instant>,
}

impl Sampler {
    pub fn new(cadence: Cadence) -> Self {
        Self {
            cadence,
            frame: 0,
            last_sent: None,
        }
    }

    /// Advance by one frame; true when this frame should be reported.
    pub fn tick(&mut self, now: Instant) -> bool {
        let frame = self.frame;
        self.frame += 1;
        match self.cadence {
            Cadence::EveryNthFrame(n) => frame % n.max(1) == 0,
            Cadence::Interval(every) => {
                let due = self
                    .last_sent
                    .map_or(true, |t| now.saturating_duration_since(t) >= every);
                if due {
                    self.last_sent = Some(now);
                }
                due
            }
        }
    }
}

/// Current wall-clock time in Unix milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Reports per-frame counts through a sink at a fixed cadence.
pub struct CountReporter<S> {
    sink: S,
    sampler: Sampler,
}

impl<S: TelemetrySink> CountReporter<S> {
    pub fn new(sink: S, cadence: Cadence) -> Self {
        Self {
            sink,
            sampler: Sampler::new(cadence),
        }
    }

    /// Record one frame's count; returns whether a report was attempted.
    pub fn observe(&mut self, object_count: usize) -> bool {
        if !self.sampler.tick(Instant::now()) {
            return false;
        }
        let record = TelemetryRecord::Count {
            shrimp_count: object_count,
        };
        match self.sink.send(&record, now_ms()) {
            Ok(()) => tracing::info!("reported shrimp_count={}", object_count),
            Err(e) => tracing::warn!("telemetry failed: {}", e),
        }
        true
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Sink that records every send and optionally fails.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub sent: Vec<(TelemetryRecord, i64)>,
        pub fail: bool,
    }

    impl TelemetrySink for RecordingSink {
        fn send(&mut self, record: &TelemetryRecord, ts_ms: i64) -> Result<(), TelemetryError> {
            self.sent.push((record.clone(), ts_ms));
            if self.fail {
                Err(TelemetryError::Status(503))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn endpoint_layout() {
        let cfg = TelemetryConfig {
            base_url: "https://tb.example/".into(),
            access_token: "TOKEN".into(),
            timeout_secs: 3.0,
        };
        assert_eq!(
            cfg.endpoint(1_700_000_000_123),
            "https://tb.example/api/v1/TOKEN/telemetry?ts=1700000000123"
        );
    }

    #[test]
    fn unusable_timeouts_are_rejected() {
        for bad in [0.0, -3.0, f64::INFINITY, f64::NAN] {
            let cfg = TelemetryConfig {
                timeout_secs: bad,
                ..Default::default()
            };
            assert!(matches!(
                HttpReporter::new(cfg),
                Err(TelemetryError::InvalidTimeout(_))
            ));
        }
    }

    #[test]
    fn records_serialise_flat() {
        let count = serde_json::to_value(TelemetryRecord::Count { shrimp_count: 7 }).expect("json");
        assert_eq!(count, serde_json::json!({ "shrimp_count": 7 }));

        let env = serde_json::to_value(TelemetryRecord::Environment {
            temperature: 27.5,
            humidity: 80.0,
        })
        .expect("json");
        assert_eq!(env, serde_json::json!({ "temperature": 27.5, "humidity": 80.0 }));
    }

    #[test]
    fn every_fifth_frame_starting_at_zero() {
        let mut s = Sampler::new(Cadence::default());
        let now = Instant::now();
        let picked: Vec<usize> = (0..12).filter(|_| s.tick(now)).collect();
        assert_eq!(picked, vec![0, 5, 10]);
    }

    #[test]
    fn interval_cadence_uses_elapsed_time() {
        let mut s = Sampler::new(Cadence::Interval(Duration::from_secs(2)));
        let t0 = Instant::now();
        assert!(s.tick(t0));
        assert!(!s.tick(t0 + Duration::from_secs(1)));
        assert!(s.tick(t0 + Duration::from_secs(2)));
        assert!(!s.tick(t0 + Duration::from_millis(3500)));
    }

    #[test]
    fn reporter_swallows_failures() {
        let sink = RecordingSink {
            fail: true,
            ..Default::default()
        };
        let mut reporter = CountReporter::new(sink, Cadence::EveryNthFrame(2));
        assert!(reporter.observe(3));
        assert!(!reporter.observe(4));
        assert!(reporter.observe(5));
        let sent: Vec<_> = reporter.sink().sent.iter().map(|(r, _)| r.clone()).collect();
        assert_eq!(
            sent,
            vec![
                TelemetryRecord::Count { shrimp_count: 3 },
                TelemetryRecord::Count { shrimp_count: 5 }
            ]
        );
    }
}
