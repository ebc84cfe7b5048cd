use api_client::error::ApiError;
use api_client::{AnalyticsSource, Ga4Client};
use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{Days, NaiveDate, Utc};
use chrono_tz::Europe::Rome;
use configuration::AnalyticsConfig;
use core_types::{DATE_DIMENSION, metrics, series};
use serde_json::{json, Value};
use std::net::SocketAddr;

fn today() -> NaiveDate {
    Utc::now().with_timezone(&Rome).date_naive()
}

/// `YYYYMMDD` of the day `n` days before today.
fn days_ago(n: u64) -> String {
    (today() - Days::new(n)).format("%Y%m%d").to_string()
}

fn dated_row(days: u64, values: &[&str]) -> Value {
    json!({
        "dimensionValues": [{ "value": days_ago(days) }],
        "metricValues": values.iter().map(|v| json!({ "value": v })).collect::<Vec<_>>()
    })
}

async fn run_report(
    Path(report): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        == Some("Bearer test-token");
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": { "code": 401, "message": "no token", "status": "UNAUTHENTICATED" } })),
        );
    }
    if report.starts_with("denied") {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": { "code": 403, "message": "no access", "status": "PERMISSION_DENIED" } })),
        );
    }

    let dimension = body["dimensions"][0]["name"].as_str();
    let first_metric = body["metrics"][0]["name"].as_str();
    // Property "sparse" has activity on only two days of the week.
    let (conversion_rows, daily_rows) = if report.starts_with("sparse") {
        (
            vec![dated_row(6, &["4", "3"]), dated_row(3, &["6", "5"])],
            vec![dated_row(3, &["80", "0.65"])],
        )
    } else {
        (
            vec![dated_row(2, &["4", "3"]), dated_row(1, &["6", "5"]), dated_row(0, &["5", "5"])],
            vec![dated_row(1, &["120", "0.4"]), dated_row(0, &["130", "0.5"])],
        )
    };
    let response = match (dimension, first_metric) {
        (Some("date"), Some("eventCount")) => json!({
            "dimensionHeaders": [{ "name": "date" }],
            "metricHeaders": [{ "name": "eventCount" }, { "name": "totalUsers" }],
            "rows": conversion_rows
        }),
        (Some("date"), _) => json!({
            "dimensionHeaders": [{ "name": "date" }],
            "metricHeaders": [{ "name": "sessions" }, { "name": "bounceRate" }],
            "rows": daily_rows
        }),
        (Some("sessionSource"), _) => json!({
            "dimensionHeaders": [{ "name": "sessionSource" }, { "name": "sessionMedium" }],
            "metricHeaders": [{ "name": "sessions" }, { "name": "totalUsers" }],
            "rows": [
                { "dimensionValues": [{ "value": "google" }, { "value": "organic" }], "metricValues": [{ "value": "130" }, { "value": "90" }] },
                { "dimensionValues": [{ "value": "(direct)" }, { "value": "(none)" }], "metricValues": [{ "value": "120" }, { "value": "70" }] }
            ]
        }),
        _ => json!({
            "dimensionHeaders": [{ "name": "country" }, { "name": "city" }],
            "metricHeaders": [{ "name": "totalUsers" }, { "name": "sessions" }]
        }),
    };
    (StatusCode::OK, Json(response))
}

async fn spawn_fake_ga4() -> SocketAddr {
    let app = Router::new().route("/properties/:report", post(run_report));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client_for(addr: SocketAddr, token: &str) -> Ga4Client {
    Ga4Client::new(
        &AnalyticsConfig {
            base_url: format!("http://{}", addr),
            access_token: token.to_string(),
            ..AnalyticsConfig::default()
        },
        Rome,
    )
    .unwrap()
}

#[tokio::test]
async fn fetch_builds_a_snapshot_from_four_reports() {
    let addr = spawn_fake_ga4().await;
    let client = client_for(addr, "test-token");

    let snapshot = client.fetch_analytics("123456", 7).await.unwrap();

    assert_eq!(
        snapshot.metric_values(series::CONVERSIONS, metrics::CONVERSIONS),
        vec![0.0, 0.0, 0.0, 0.0, 0.0, 4.0, 6.0, 5.0]
    );
    assert_eq!(
        snapshot.metric_values(series::DAILY, metrics::SESSIONS),
        vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 120.0, 130.0]
    );
    let daily = snapshot.series(series::DAILY).unwrap();
    assert_eq!(daily.row_on(today()).unwrap().metric(metrics::BOUNCE_RATE), Some(0.5));
    assert_eq!(
        snapshot.metric_values(series::TRAFFIC, metrics::SESSIONS),
        vec![130.0, 120.0]
    );
    assert!(snapshot.series(series::SEGMENTS).unwrap().is_empty());
    assert_eq!(snapshot.record_count(), 18);
}

#[tokio::test]
async fn days_without_conversions_are_reported_as_zero() {
    let addr = spawn_fake_ga4().await;
    let client = client_for(addr, "test-token");

    let snapshot = client.fetch_analytics("sparse", 7).await.unwrap();

    let conversions = snapshot.series(series::CONVERSIONS).unwrap();
    assert_eq!(
        conversions.values(metrics::CONVERSIONS),
        vec![0.0, 4.0, 0.0, 0.0, 6.0, 0.0, 0.0, 0.0]
    );
    let first = conversions.rows.first().unwrap().dimension(DATE_DIMENSION);
    assert_eq!(first, Some(days_ago(7).as_str()));
    let last = conversions.rows.last().unwrap().dimension(DATE_DIMENSION);
    assert_eq!(last, Some(days_ago(0).as_str()));
    assert_eq!(conversions.row_on(today()).unwrap().metric(metrics::USERS), Some(0.0));

    let mean = conversions.values(metrics::CONVERSIONS).iter().sum::<f64>() / conversions.len() as f64;
    assert_eq!(mean, 1.25);
    assert_eq!(snapshot.series(series::DAILY).unwrap().len(), 8);
}

#[tokio::test]
async fn provider_errors_fail_the_fetch() {
    let addr = spawn_fake_ga4().await;
    let client = client_for(addr, "test-token");

    let err = client.fetch_analytics("denied", 7).await.unwrap_err();

    match err {
        ApiError::Provider(status, message) => {
            assert_eq!(status, 403);
            assert!(message.contains("PERMISSION_DENIED"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn wrong_token_is_rejected_by_the_provider() {
    let addr = spawn_fake_ga4().await;
    let client = client_for(addr, "stale-token");

    let err = client.fetch_analytics("123456", 7).await.unwrap_err();

    assert!(matches!(err, ApiError::Provider(401, _)));
}

#[tokio::test]
async fn missing_property_id_is_not_configured() {
    let addr = spawn_fake_ga4().await;
    let client = client_for(addr, "test-token");

    let err = client.fetch_analytics("", 7).await.unwrap_err();

    assert!(matches!(err, ApiError::NotConfigured(_)));
}

#[tokio::test]
async fn missing_token_fails_the_fetch_not_the_construction() {
    let addr = spawn_fake_ga4().await;
    let client = client_for(addr, "");

    let err = client.fetch_analytics("123456", 7).await.unwrap_err();

    match err {
        ApiError::NotConfigured(reason) => assert!(reason.contains("access token")),
        other => panic!("unexpected error: {other}"),
    }
}
