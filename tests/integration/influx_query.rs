//! Integration tests for the InfluxDB query source
//!
//! These tests verify that:
//! - The query reaches /db/<database>/series with credentials and the query
//! - The first point's value column is judged against the thresholds
//! - Empty, malformed and failed responses are acquisition errors

use std::time::Duration;

use assert_matches::assert_matches;
use health_probes::error::{AcquisitionError, CheckError};
use health_probes::runner::CheckRunner;
use health_probes::sources::influx::{
    AggregateFunction, InfluxConnection, QuerySpec, TimeSeriesQuery,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::{greater_than, influx_response, less_than};

fn query_for(mock_server: &MockServer, query: QuerySpec) -> TimeSeriesQuery {
    let address = mock_server.address();
    TimeSeriesQuery::new(
        InfluxConnection {
            ip: address.ip().to_string(),
            port: address.port(),
            database: "diamond".to_string(),
            user: "root".to_string(),
            password: "secret".to_string(),
        },
        query,
        Duration::from_secs(3),
    )
    .unwrap()
}

fn mean_of_cpu() -> QuerySpec {
    QuerySpec::resolve(None, Some("servers.cpu.idle"), Some(AggregateFunction::Mean), 500).unwrap()
}

#[tokio::test]
async fn test_influx_query_is_sent() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/db/diamond/series"))
        .and(query_param("u", "root"))
        .and(query_param("p", "secret"))
        .and(query_param(
            "q",
            "select MEAN(value) from \"servers.cpu.idle\" where time > now() - 500s",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(influx_response(
            "servers.cpu.idle",
            serde_json::json!([[1420070400, 12.5]]),
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let runner =
        CheckRunner::new(query_for(&mock_server, mean_of_cpu())).with_thresholds(greater_than(None, 200.0));

    let outcome = runner.run().await;
    assert_eq!(outcome.exit_code, 0);
    assert_eq!(
        outcome.stdout.as_deref(),
        Some(
            "Threshold Event:PASSING ThresholdValue:200.000000 CurrentValue:12.500000 Series:servers.cpu.idle"
        )
    );
}

#[tokio::test]
async fn test_influx_thresholds() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/db/diamond/series"))
        .respond_with(ResponseTemplate::new(200).set_body_json(influx_response(
            "servers.cpu.idle",
            serde_json::json!([[1420070400, 15.0], [1420070340, 90.0]]),
        )))
        .mount(&mock_server)
        .await;

    let warning = CheckRunner::new(query_for(&mock_server, mean_of_cpu()))
        .with_thresholds(less_than(Some(20.0), 10.0));
    let outcome = warning.run().await;
    assert_eq!(outcome.exit_code, 1);
    assert_eq!(
        outcome.stdout.as_deref(),
        Some(
            "Threshold Event:WARNING ThresholdValue:20.000000 CurrentValue:15.000000 Series:servers.cpu.idle"
        )
    );

    let critical = CheckRunner::new(query_for(&mock_server, mean_of_cpu()))
        .with_thresholds(greater_than(Some(5.0), 10.0));
    assert_eq!(critical.run().await.exit_code, 2);
}

#[tokio::test]
async fn test_influx_custom_query_is_verbatim() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/db/diamond/series"))
        .and(query_param("q", "select max(value) from \"disk.used\" limit 1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(influx_response(
            "disk.used",
            serde_json::json!([[1420070400, 95.0]]),
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let query = QuerySpec::Custom("select max(value) from \"disk.used\" limit 1".to_string());
    let runner =
        CheckRunner::new(query_for(&mock_server, query)).with_thresholds(greater_than(Some(80.0), 90.0));
    assert_eq!(runner.run().await.exit_code, 2);
}

#[tokio::test]
async fn test_influx_empty_response() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(&mock_server)
        .await;

    let runner =
        CheckRunner::new(query_for(&mock_server, mean_of_cpu())).with_thresholds(greater_than(None, 1.0));

    let err = runner.check().await.unwrap_err();
    assert_matches!(err, CheckError::Acquisition(AcquisitionError::NoData(_)));
    assert_eq!(runner.run().await.exit_code, 1);
}

#[tokio::test]
async fn test_influx_malformed_response() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Couldn't find series"))
        .mount(&mock_server)
        .await;

    let runner =
        CheckRunner::new(query_for(&mock_server, mean_of_cpu())).with_thresholds(greater_than(None, 1.0));

    let err = runner.check().await.unwrap_err();
    assert_matches!(err, CheckError::Acquisition(AcquisitionError::Malformed(_)));
}

#[tokio::test]
async fn test_influx_error_status() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid username/password"))
        .mount(&mock_server)
        .await;

    let runner =
        CheckRunner::new(query_for(&mock_server, mean_of_cpu())).with_thresholds(greater_than(None, 1.0));

    let err = runner.check().await.unwrap_err();
    assert_matches!(
        err,
        CheckError::Acquisition(AcquisitionError::UnexpectedStatus { status: 401, .. })
    );
    assert_eq!(err.exit_code(), 1);
}
