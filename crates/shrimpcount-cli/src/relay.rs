//! Status-file relay: forwards a periodically rewritten JSON snapshot.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::telemetry::{now_ms, TelemetryError, TelemetryRecord, TelemetrySink};

/// Contents of the status file. Missing fields read as zero.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct StatusSnapshot {
    pub shrimp_total: u64,
    pub shrimp_current: u64,
    pub shrimp_small: u64,
    pub shrimp_medium: u64,
    pub shrimp_large: u64,
    pub shrimp_weight: f64,
    pub shrimp_total_weight: f64,
    pub temperature: f64,
    pub humidity: f64,
    /// Unix seconds; the read time is used when absent.
    pub timestamp: Option<f64>,
}

impl StatusSnapshot {
    pub fn read(path: &Path) -> Result<Self, TelemetryError> {
        let text = std::fs::read_to_string(path).map_err(|source| TelemetryError::StatusFile {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| TelemetryError::StatusParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn timestamp_ms(&self, fallback_ms: i64) -> i64 {
        self.timestamp
            .map(|s| (s * 1000.0) as i64)
            .unwrap_or(fallback_ms)
    }

    pub fn extended_record(&self) -> TelemetryRecord {
        TelemetryRecord::Extended {
            shrimp_total: self.shrimp_total,
            shrimp_current: self.shrimp_current,
            shrimp_small: self.shrimp_small,
            shrimp_medium: self.shrimp_medium,
            shrimp_large: self.shrimp_large,
            shrimp_weight: self.shrimp_weight,
            shrimp_total_weight: self.shrimp_total_weight,
        }
    }

    pub fn environment_record(&self) -> TelemetryRecord {
        TelemetryRecord::Environment {
            temperature: self.temperature,
            humidity: self.humidity,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    pub status_file: PathBuf,
    pub poll_interval: Duration,
    pub environment_interval: Duration,
}

impl RelayConfig {
    pub fn new(status_file: impl Into<PathBuf>) -> Self {
        Self {
            status_file: status_file.into(),
            poll_interval: Duration::from_secs(3),
            environment_interval: Duration::from_secs(300),
        }
    }
}

/// What one relay step sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayTick {
    pub extended: bool,
    pub environment: bool,
}

pub struct StatusRelay<S> {
    config: RelayConfig,
    sink: S,
    last_environment: Option<Instant>,
}

impl<S: TelemetrySink> StatusRelay<S> {
    pub fn new(config: RelayConfig, sink: S) -> Self {
        Self {
            config,
            sink,
            last_environment: None,
        }
    }

    /// Read the status file once and forward it.
    ///
    /// The environment record goes out on the first step and then at most
    /// once per `environment_interval`. Send failures are logged; only an
    /// unreadable status file is an error.
    pub fn step(&mut self, now: Instant) -> Result<RelayTick, TelemetryError> {
        let snapshot = StatusSnapshot::read(&self.config.status_file)?;
        let ts = snapshot.timestamp_ms(now_ms());
        let mut tick = RelayTick::default();

        match self.sink.send(&snapshot.extended_record(), ts) {
            Ok(()) => tick.extended = true,
            Err(e) => tracing::warn!("status relay: {}", e),
        }

        let env_due = self.last_environment.map_or(true, |t| {
            now.saturating_duration_since(t) >= self.config.environment_interval
        });
        if env_due {
            match self.sink.send(&snapshot.environment_record(), ts) {
                Ok(()) => tick.environment = true,
                Err(e) => tracing::warn!("status relay (environment): {}", e),
            }
            self.last_environment = Some(now);
        }
        Ok(tick)
    }

    /// Step forever (or `max_steps` times), sleeping `poll_interval` between steps.
    pub fn run(&mut self, max_steps: Option<usize>) {
        let mut steps = 0usize;
        loop {
            match self.step(Instant::now()) {
                Ok(tick) => tracing::debug!("relay step {}: {:?}", steps, tick),
                Err(e) => tracing::warn!("status relay: {}", e),
            }
            steps += 1;
            if max_steps.is_some_and(|m| steps >= m) {
                break;
            }
            std::thread::sleep(self.config.poll_interval);
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::tests::RecordingSink;

    #[test]
    fn missing_fields_default_to_zero() {
        let snap: StatusSnapshot =
            serde_json::from_str(r#"{ "shrimp_total": 12, "humidity": 71.5 }"#).expect("json");
        assert_eq!(snap.shrimp_total, 12);
        assert_eq!(snap.shrimp_small, 0);
        assert_eq!(snap.shrimp_weight, 0.0);
        assert_eq!(snap.humidity, 71.5);
        assert_eq!(snap.timestamp_ms(42), 42);
    }

    #[test]
    fn timestamp_is_converted_to_millis() {
        let snap = StatusSnapshot {
            timestamp: Some(1_700_000_000.5),
            ..Default::default()
        };
        assert_eq!(snap.timestamp_ms(0), 1_700_000_000_500);
    }

    #[test]
    fn environment_is_sent_on_its_own_schedule() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("status.json");
        std::fs::write(
            &path,
            r#"{ "shrimp_total": 3, "temperature": 28.0, "timestamp": 100 }"#,
        )
        .expect("write");

        let mut relay = StatusRelay::new(RelayConfig::new(&path), RecordingSink::default());
        let t0 = Instant::now();
        let first = relay.step(t0).expect("step");
        assert_eq!(first, RelayTick { extended: true, environment: true });
        let second = relay.step(t0 + Duration::from_secs(3)).expect("step");
        assert_eq!(second, RelayTick { extended: true, environment: false });
        let third = relay.step(t0 + Duration::from_secs(300)).expect("step");
        assert!(third.environment);

        let sent = &relay.sink().sent;
        assert_eq!(sent.len(), 5);
        assert!(sent.iter().all(|(_, ts)| *ts == 100_000));
        assert!(matches!(sent[0].0, TelemetryRecord::Extended { shrimp_total: 3, .. }));
        assert_eq!(
            sent[1].0,
            TelemetryRecord::Environment {
                temperature: 28.0,
                humidity: 0.0
            }
        );
    }

    #[test]
    fn unreadable_status_file_is_an_error() {
        let mut relay = StatusRelay::new(
            RelayConfig::new("/nonexistent/status.json"),
            RecordingSink::default(),
        );
        assert!(matches!(
            relay.step(Instant::now()),
            Err(TelemetryError::StatusFile { .. })
        ));
        assert!(relay.sink().sent.is_empty());
    }
}
