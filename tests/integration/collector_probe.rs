//! Integration tests for the collector-process probe
//!
//! A shell script stands in for the collector. It keeps a copy of the
//! configuration it was handed and prints a canned series line.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use assert_matches::assert_matches;
use health_probes::Reading;
use health_probes::error::{AcquisitionError, CheckError};
use health_probes::runner::{CheckRunner, Report};
use health_probes::sources::MetricSource;
use health_probes::sources::process::{PluginConfig, ProcessProbe, ServiceEndpoint};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use crate::helpers::greater_than;

/// Write an executable collector into `dir` that prints `stdout`.
fn fake_collector(dir: &Path, stdout: &str) -> PathBuf {
    let path = dir.join("collector");
    let script = format!(
        "#!/bin/sh\ncp \"$2\" \"{}\"\nprintf '%s\\n' '{stdout}'\n",
        dir.join("captured.conf").display()
    );
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn cpu_config(service: Option<ServiceEndpoint>) -> PluginConfig {
    PluginConfig {
        plugin: "cpu".to_string(),
        parameters: PluginConfig::split_parameters("percpu = false|totalcpu = true"),
        service,
    }
}

fn artifacts_left(working_dir: &Path) -> Vec<String> {
    std::fs::read_dir(working_dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("cpu-") && name.ends_with(".conf"))
        .collect()
}

struct Fixture {
    bin_dir: TempDir,
    working_dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Fixture {
            bin_dir: tempfile::tempdir().unwrap(),
            working_dir: tempfile::tempdir().unwrap(),
        }
    }

    fn probe(&self, config: PluginConfig, series: &str, stdout: &str) -> ProcessProbe {
        let collector = fake_collector(self.bin_dir.path(), stdout);
        ProcessProbe::new(
            config,
            series,
            collector,
            self.working_dir.path(),
            Duration::from_secs(10),
        )
        .unwrap()
    }

    fn captured(&self) -> String {
        std::fs::read_to_string(self.bin_dir.path().join("captured.conf")).unwrap()
    }
}

#[tokio::test]
async fn test_collector_value_is_scraped() {
    let fixture = Fixture::new();
    let probe = fixture.probe(cpu_config(None), "my.series", "> my.series 42.5");

    let reading = probe.acquire().await.unwrap();
    assert_matches!(reading, Reading::Metric(metric) => {
        assert_eq!(metric.name, "my.series");
        assert_eq!(metric.value, 42.5);
    });

    let captured = fixture.captured();
    assert!(captured.contains("[cpu]\npercpu = false\ntotalcpu = true\n"));
    assert!(!captured.contains("servers ="));
}

#[tokio::test]
async fn test_collector_artifact_is_removed() {
    let fixture = Fixture::new();
    let probe = fixture.probe(cpu_config(None), "my.series", "> my.series 42.5");

    probe.acquire().await.unwrap();
    assert_eq!(artifacts_left(fixture.working_dir.path()), Vec::<String>::new());

    // also on the failure path
    let missing = fixture.probe(cpu_config(None), "other.series", "> my.series 42.5");
    assert_matches!(
        missing.acquire().await,
        Err(AcquisitionError::SeriesNotFound { .. })
    );
    assert_eq!(artifacts_left(fixture.working_dir.path()), Vec::<String>::new());
}

#[tokio::test]
async fn test_collector_service_line() {
    let fixture = Fixture::new();
    let service = ServiceEndpoint {
        protocol: "tcp://".to_string(),
        ip: "localhost".to_string(),
        port: 6379,
    };
    let probe = fixture.probe(
        PluginConfig {
            plugin: "redis".to_string(),
            parameters: vec![],
            service: Some(service),
        },
        "redis.clients",
        "> redis.clients 3",
    );

    probe.acquire().await.unwrap();
    assert!(
        fixture
            .captured()
            .ends_with("[redis]\nservers = [\"tcp://localhost:6379\"]\n")
    );
}

#[tokio::test]
async fn test_collector_thresholds() {
    let fixture = Fixture::new();
    let probe = fixture.probe(cpu_config(None), "cpu.usage", "> cpu.usage 91.25");
    let runner = CheckRunner::new(probe).with_thresholds(greater_than(Some(80.0), 90.0));

    let report = runner.check().await.unwrap();
    assert_matches!(&report, Report::Threshold(result) => {
        assert_eq!(result.value.value, 91.25);
    });

    let outcome = runner.run().await;
    assert_eq!(outcome.exit_code, 2);
    assert_eq!(
        outcome.stdout.as_deref(),
        Some("Threshold Event:CRITICAL ThresholdValue:90.000000 CurrentValue:91.250000 Series:cpu.usage")
    );
}

#[tokio::test]
async fn test_series_not_found_exits_one() {
    let fixture = Fixture::new();
    let probe = fixture.probe(cpu_config(None), "cpu.missing", "> cpu.usage 12");
    let runner = CheckRunner::new(probe).with_thresholds(greater_than(None, 90.0));

    let outcome = runner.run().await;
    assert_eq!(outcome.exit_code, 1);
    assert_eq!(outcome.stdout, None);
    assert!(outcome.stderr.unwrap().contains("cpu.missing"));
}

#[tokio::test]
async fn test_missing_collector_binary() {
    let working_dir = tempfile::tempdir().unwrap();
    let probe = ProcessProbe::new(
        cpu_config(None),
        "cpu.usage",
        working_dir.path().join("does-not-exist"),
        working_dir.path(),
        Duration::from_secs(10),
    )
    .unwrap();
    let runner = CheckRunner::new(probe).with_thresholds(greater_than(None, 90.0));

    let err = runner.check().await.unwrap_err();
    assert_matches!(err, CheckError::Acquisition(AcquisitionError::Collector(_)));
    assert_eq!(err.exit_code(), 1);
    assert_eq!(artifacts_left(working_dir.path()), Vec::<String>::new());
}

#[tokio::test]
async fn test_collector_is_killed_after_timeout() {
    let fixture = Fixture::new();
    let collector = fixture.bin_dir.path().join("collector");
    std::fs::write(&collector, "#!/bin/sh\nexec sleep 5\n").unwrap();
    std::fs::set_permissions(&collector, std::fs::Permissions::from_mode(0o755)).unwrap();

    let probe = ProcessProbe::new(
        cpu_config(None),
        "cpu.usage",
        collector,
        fixture.working_dir.path(),
        Duration::from_millis(300),
    )
    .unwrap();
    let runner = CheckRunner::new(probe).with_thresholds(greater_than(None, 90.0));

    let started = std::time::Instant::now();
    let err = runner.check().await.unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_matches!(
        err,
        CheckError::Acquisition(AcquisitionError::CollectorTimeout(_))
    );
    assert_eq!(err.exit_code(), 1);
    assert_eq!(artifacts_left(fixture.working_dir.path()), Vec::<String>::new());
}

#[tokio::test]
async fn test_unwritable_working_dir() {
    let fixture = Fixture::new();
    let collector = fake_collector(fixture.bin_dir.path(), "> cpu.usage 1");
    let probe = ProcessProbe::new(
        cpu_config(None),
        "cpu.usage",
        collector,
        fixture.working_dir.path().join("missing"),
        Duration::from_secs(10),
    )
    .unwrap();

    let err = CheckRunner::new(probe)
        .with_thresholds(greater_than(None, 90.0))
        .check()
        .await
        .unwrap_err();
    assert_matches!(err, CheckError::Acquisition(AcquisitionError::Artifact(_)));
    assert_eq!(err.exit_code(), 2);
}
