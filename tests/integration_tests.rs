//! Integration tests for the daily_bot_stats library
//!
//! These tests run both jobs through the public command API against mocked
//! HTTP collaborators and a fixture warehouse.

use chrono::NaiveDate;
use httpmock::prelude::*;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use daily_bot_stats::commands::{self, ExtractOptions, NotifyOptions};
use daily_bot_stats::delivery::StatsHandoff;
use daily_bot_stats::{Config, Error, Job, StatsReport};

const FIXTURE: &str = r#"
snapshot:
  - total: 1200
    trials: 130
    active_subscriptions: 300
    google_play_active_installs: 41
churn_events:
  - { email: a@example.com, status: Canceled, status_date: 2025-03-14 }
  - { email: b@example.com, status: Conversion, status_date: 2025-03-01 }
  - { email: null, status: Canceled, status_date: 2025-03-14 }
coupon_activity:
  - { email: a@example.com, coupon_code: SAVE10 }
  - { email: c@example.com, coupon_code: No Coupon Code }
coupon_conversions:
  - { coupon_code: SAVE10, total_trials: 20, total_conversions: 8, percent_converted: "0.40" }
  - { coupon_code: No Coupon Code, total_trials: 100, total_conversions: 60, percent_converted: 0.6 }
signups:
  - { signup_date: 2025-03-14, coupon_code: SAVE10 }
  - { signup_date: 2025-03-13, coupon_code: null }
  - { signup_date: 2025-03-12, coupon_code: No Coupon Code }
"#;

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn config_for(server: &MockServer, dir: &Path) -> Config {
    let yaml = format!(
        r#"
report:
  timezone: PST8PDT
http:
  timeout_secs: 5
warehouse:
  host: warehouse.invalid
  port: 5439
  user: reporter
  password: secret
  dbname: analytics
handoff:
  url: "{handoff}"
  function_name: daily_bot-stats-notify
analytics:
  api_url: "{pendo}"
  integration_key: test-key
  start_date: "2025-02-12"
  segments:
    - {{ name: Segment-A, id: seg-a }}
    - {{ name: Segment-B, id: seg-b }}
  pages:
    - {{ name: Web, id: page-web }}
    - {{ name: iOS, id: page-ios }}
    - {{ name: Android, id: page-android }}
  feature_groups:
    - {{ name: Roleplay, features: [feat-rp] }}
    - {{ name: Automation, features: [feat-a1, feat-a2, feat-a3] }}
chat:
  webhook_url: "{chat}"
alerts:
  url: "{alerts}"
  topic: stats-alerts
"#,
        handoff = server.url("/invoke"),
        pendo = server.url("/pendo"),
        chat = server.url("/chat"),
        alerts = server.url("/alerts"),
    );
    let path = write(dir, "config.yml", &yaml);
    Config::load_from_file(path).unwrap()
}

fn today() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(2025, 3, 15)
}

// ============================================================================
// Extract
// ============================================================================

#[tokio::test]
async fn extract_from_fixture_hands_off_versioned_payload() {
    let server = MockServer::start_async().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, dir.path());

    let invoke = server.mock(|when, then| {
        when.method(POST)
            .path("/invoke")
            .header("x-invocation-type", "Event")
            .header("x-function-name", "daily_bot-stats-notify")
            .is_true(|req| {
                let body: Value = serde_json::from_slice(req.body().as_ref()).unwrap_or_default();
                body["schema_version"] == 1
                    && body["metrics"]["SAVE10_coupon_active_subscriptions"] == 1
                    && body["metrics"]["churn_canceled_week"] == 1
            });
        then.status(202);
    });

    let options = ExtractOptions {
        fixture: Some(write(dir.path(), "fixture.yml", FIXTURE)),
        today: today(),
        print: false,
    };
    let handoff = commands::extract::run(&config, &options).await.unwrap();

    invoke.assert_calls(1);
    let metrics = &handoff.metrics;
    assert_eq!(metrics["report_date"], "03/14/2025");
    assert_eq!(metrics["total"], 1200);
    assert_eq!(metrics["SAVE10_total_trials"], 20);
    assert_eq!(metrics["SAVE10_conversion_rate"].as_f64(), Some(0.4));
    assert_eq!(metrics["No Coupon Code_coupon_active_subscriptions"], 1);
    assert_eq!(metrics["churn_conversion_month"], 1);
    assert_eq!(metrics["churn_canceled_all"], 1);
    assert_eq!(metrics["last_week_new_signups_without_coupon"], 2);
    assert_eq!(metrics["last_week_new_signups_with_coupon"], 1);
    assert_eq!(metrics["all_total_new_signups"], 3);
    assert_eq!(
        metrics.keys().filter(|k| k.starts_with("SAVE10_")).count(),
        4
    );
}

#[tokio::test]
async fn extract_failure_is_alerted_and_returned() {
    let server = MockServer::start_async().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, dir.path());

    let alert = server.mock(|when, then| {
        when.method(POST).path("/alerts").is_true(|req| {
            let body: Value = serde_json::from_slice(req.body().as_ref()).unwrap_or_default();
            body["subject"] == "Slack Notification"
                && body["topic"] == "stats-alerts"
                && body["message"]
                    .as_str()
                    .is_some_and(|m| m.starts_with("Job daily_bot_stats_extract failed:"))
        });
        then.status(200);
    });
    let invoke = server.mock(|when, then| {
        when.method(POST).path("/invoke");
        then.status(202);
    });

    // Two snapshot rows violate the single-row contract.
    let fixture = "snapshot:\n  - total: 1\n  - total: 2\n";
    let options = ExtractOptions {
        fixture: Some(write(dir.path(), "fixture.yml", fixture)),
        today: today(),
        print: false,
    };
    let err = commands::extract::run(&config, &options).await.unwrap_err();

    assert!(matches!(err, Error::QueryShape(_)));
    alert.assert_calls(1);
    invoke.assert_calls(0);
}

// ============================================================================
// Notify
// ============================================================================

fn mock_analytics(server: &MockServer) {
    server.mock(|when, then| {
        when.method(POST)
            .path("/pendo")
            .header("x-pendo-integration-key", "test-key")
            .is_true(|req| String::from_utf8_lossy(req.body().as_ref()).contains("pageEvents"));
        then.status(200).json_body(json!({ "results": [{ "views": 10 }] }));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/pendo")
            .is_true(|req| String::from_utf8_lossy(req.body().as_ref()).contains("featureEvents"));
        then.status(200).json_body(json!({ "results": [{ "clicks": 2 }] }));
    });
}

fn save10_payload() -> Value {
    json!({
        "report_date": "03/14/2025",
        "total": 1200,
        "SAVE10_coupon_active_subscriptions": 5,
        "SAVE10_total_trials": 20,
        "SAVE10_total_conversions": 8,
        "SAVE10_conversion_rate": 0.4,
        "No Coupon Code_coupon_active_subscriptions": 50,
        "No Coupon Code_total_trials": 100,
        "No Coupon Code_total_conversions": 60,
        "No Coupon Code_conversion_rate": 0.6
    })
}

#[tokio::test]
async fn notify_posts_report_with_usage() {
    let server = MockServer::start_async().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, dir.path());
    mock_analytics(&server);

    let chat = server.mock(|when, then| {
        when.method(POST).path("/chat").is_true(|req| {
            let body: Value = serde_json::from_slice(req.body().as_ref()).unwrap_or_default();
            let text = body["text"].as_str().unwrap_or_default();
            text.starts_with("Stats for 03/14/2025\n•  Lifetime user total: 1200")
                && text.contains("Total Active Users: 55")
                && text.contains("Total Active Trial Users without a coupon: 100")
                && text.contains("Total Active Trial Users with a coupon: 20")
                && text.contains("Segment-B / Android: 10")
                && text.contains("Segment-A / Automation: 6")
        });
        then.status(200).body("ok");
    });

    let csv_dir = dir.path().join("grids");
    let options = NotifyOptions {
        payload: String::new(),
        dry_run: false,
        export_csv: Some(csv_dir.clone()),
    };
    let outcome = commands::notify::run_with_payload(&config, &options, save10_payload())
        .await
        .unwrap();

    chat.assert_calls(1);
    assert_eq!(outcome.usage.views.len(), 6);
    assert_eq!(outcome.usage.total_clicks(), 2 * (2 + 6));

    let views_csv = std::fs::read_to_string(csv_dir.join("views.csv")).unwrap();
    assert_eq!(views_csv.lines().count(), 1 + 6);
}

#[tokio::test]
async fn analytics_error_aborts_before_chat_and_alerts() {
    let server = MockServer::start_async().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, dir.path());

    let pendo = server.mock(|when, then| {
        when.method(POST).path("/pendo");
        then.status(500).body("internal error");
    });
    let chat = server.mock(|when, then| {
        when.method(POST).path("/chat");
        then.status(200);
    });
    let alert = server.mock(|when, then| {
        when.method(POST).path("/alerts").is_true(|req| {
            let body: Value = serde_json::from_slice(req.body().as_ref()).unwrap_or_default();
            body["subject"] == "Slack Notification Error"
        });
        then.status(200);
    });

    let options = NotifyOptions::default();
    let err = commands::notify::run_with_payload(&config, &options, save10_payload())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::AnalyticsError(_)));
    pendo.assert_calls(1);
    chat.assert_calls(0);
    alert.assert_calls(1);
}

#[tokio::test]
async fn malformed_event_is_alerted() {
    let server = MockServer::start_async().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, dir.path());

    let pendo = server.mock(|when, then| {
        when.method(POST).path("/pendo");
        then.status(200).json_body(json!({ "results": [] }));
    });
    let alert = server.mock(|when, then| {
        when.method(POST).path("/alerts").is_true(|req| {
            let body: Value = serde_json::from_slice(req.body().as_ref()).unwrap_or_default();
            body["subject"] == "Slack Notification Error"
                && body["message"]
                    .as_str()
                    .is_some_and(|m| m.starts_with("Job daily_bot_stats_notify failed:"))
        });
        then.status(200);
    });

    let options = NotifyOptions {
        payload: write(dir.path(), "event.json", "{not json")
            .to_string_lossy()
            .into_owned(),
        ..Default::default()
    };
    let err = commands::notify::run(&config, &options).await.unwrap_err();

    assert!(matches!(err, Error::SerializationError(_)));
    alert.assert_calls(1);
    pendo.assert_calls(0);
}

#[tokio::test]
async fn feature_click_failure_aborts_before_chat() {
    let server = MockServer::start_async().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, dir.path());

    let views = server.mock(|when, then| {
        when.method(POST)
            .path("/pendo")
            .is_true(|req| String::from_utf8_lossy(req.body().as_ref()).contains("pageEvents"));
        then.status(200).json_body(json!({ "results": [{ "views": 10 }] }));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/pendo")
            .is_true(|req| String::from_utf8_lossy(req.body().as_ref()).contains("feat-a2"));
        then.status(500).body("aggregation failed");
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/pendo")
            .is_true(|req| {
                let body = String::from_utf8_lossy(req.body().as_ref());
                body.contains("featureEvents") && !body.contains("feat-a2")
            });
        then.status(200).json_body(json!({ "results": [{ "clicks": 2 }] }));
    });
    let chat = server.mock(|when, then| {
        when.method(POST).path("/chat");
        then.status(200);
    });
    let alert = server.mock(|when, then| {
        when.method(POST).path("/alerts");
        then.status(200);
    });

    let err = commands::notify::run_with_payload(&config, &NotifyOptions::default(), save10_payload())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::AnalyticsError(_)));
    views.assert_calls(6);
    chat.assert_calls(0);
    alert.assert_calls(1);
}

#[tokio::test]
async fn failed_alert_keeps_original_error() {
    let server = MockServer::start_async().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, dir.path());
    mock_analytics(&server);

    server.mock(|when, then| {
        when.method(POST).path("/chat");
        then.status(500).body("chat down");
    });
    let alert = server.mock(|when, then| {
        when.method(POST).path("/alerts");
        then.status(503);
    });

    let err = commands::notify::run_with_payload(&config, &NotifyOptions::default(), save10_payload())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ChatError(_)));
    assert!(err.to_string().contains("chat down"));
    alert.assert_calls(1);
}

// ============================================================================
// Handoff contract
// ============================================================================

#[test]
fn extract_output_is_accepted_by_notify_side() {
    let report = StatsReport {
        report_date: "03/14/2025".into(),
        ..Default::default()
    };
    let sent = StatsHandoff::new(&report).unwrap();
    let wire = serde_json::to_string(&sent).unwrap();

    let received = StatsHandoff::parse(&wire).unwrap();
    assert_eq!(received, sent);
    assert_eq!(received.report().unwrap(), report);
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn check_config_names_missing_values() {
    let dir = tempfile::tempdir().unwrap();
    let yaml = r#"
handoff:
  url: http://invoke.test
chat:
  webhook_url: ""
alerts:
  url: http://alerts.test
  topic: t
"#;
    let config = Config::load_from_file(write(dir.path(), "config.yml", yaml)).unwrap();

    let problems = commands::check_config::run(&config, &[Job::Notify]);

    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0].0, Job::Notify);
    assert!(problems[0].1.contains(&"chat.webhook_url".to_string()));
    assert!(config.validate_for(Job::Notify).is_err());
}
