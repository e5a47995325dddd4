//! Configuration for the warehouse, analytics API and delivery endpoints
//!
//! Loads configuration from config.yml. String values written as `${VAR}`
//! are resolved from the environment, and every scalar falls back to the
//! environment variable the deployment historically used.

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;
use std::fs;
use std::path::Path;

use crate::{Error, Result};

/// Default constants (fallback if config.yml omits them)
pub const DEFAULT_TIMEZONE: &str = "PST8PDT";
pub const DEFAULT_WAREHOUSE_PORT: u16 = 5439;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const NOTIFY_FUNCTION_NAME: &str = "daily_bot-stats-notify";

/// A named deployment identifier (segment or page).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NamedId {
    pub name: String,
    pub id: String,
}

impl NamedId {
    pub fn new(name: &str, id: &str) -> Self {
        Self {
            name: name.to_string(),
            id: id.to_string(),
        }
    }
}

pub type Segment = NamedId;
pub type Page = NamedId;

/// A feature group sums clicks over all of its feature ids.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeatureGroup {
    pub name: String,
    #[serde(alias = "features")]
    pub feature_ids: Vec<String>,
}

impl FeatureGroup {
    pub fn new(name: &str, feature_ids: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            feature_ids: feature_ids.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Which pieces of configuration a run needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Warehouse,
    Handoff,
    Analytics,
    Chat,
    Alerts,
}

/// The two scheduled jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    Extract,
    Notify,
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::Extract => "daily_bot_stats_extract",
            Job::Notify => "daily_bot_stats_notify",
        }
    }

    /// Subject line of the failure alert.
    pub fn alert_subject(&self) -> &'static str {
        match self {
            Job::Extract => "Slack Notification",
            Job::Notify => "Slack Notification Error",
        }
    }

    /// Everything the job needs in a normal scheduled run.
    pub fn requirements(&self) -> &'static [Requirement] {
        match self {
            Job::Extract => &[
                Requirement::Warehouse,
                Requirement::Handoff,
                Requirement::Alerts,
            ],
            Job::Notify => &[
                Requirement::Analytics,
                Requirement::Chat,
                Requirement::Alerts,
            ],
        }
    }
}

/// YAML config structures
#[derive(Debug, Default, Deserialize)]
struct YamlConfig {
    report: Option<ReportYaml>,
    http: Option<HttpYaml>,
    warehouse: Option<WarehouseYaml>,
    handoff: Option<HandoffYaml>,
    analytics: Option<AnalyticsYaml>,
    chat: Option<ChatYaml>,
    alerts: Option<AlertsYaml>,
}

#[derive(Debug, Default, Deserialize)]
struct ReportYaml {
    timezone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct HttpYaml {
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct WarehouseYaml {
    host: Option<String>,
    #[serde(default, deserialize_with = "deserialize_string_or_number")]
    port: Option<String>,
    user: Option<String>,
    password: Option<String>,
    dbname: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct HandoffYaml {
    url: Option<String>,
    function_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AnalyticsYaml {
    api_url: Option<String>,
    integration_key: Option<String>,
    start_date: Option<String>,
    #[serde(default)]
    segments: Vec<NamedId>,
    #[serde(default)]
    pages: Vec<NamedId>,
    #[serde(default)]
    feature_groups: Vec<FeatureGroup>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatYaml {
    webhook_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AlertsYaml {
    url: Option<String>,
    topic: Option<String>,
}

/// Deserialize a value that can be either a string or a number
fn deserialize_string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value: Option<serde_yaml::Value> = Option::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(serde_yaml::Value::String(s)) => Ok(Some(s)),
        Some(serde_yaml::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected string or number, got {:?}",
            other
        ))),
    }
}

#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
}

impl WarehouseConfig {
    /// Connection options for the Postgres wire protocol. Credentials are
    /// passed as fields, so reserved URL characters need no escaping.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.dbname)
    }
}

#[derive(Debug, Clone)]
pub struct HandoffConfig {
    pub url: String,
    pub function_name: String,
}

#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    pub api_url: String,
    pub integration_key: String,
    pub start_date: Option<NaiveDate>,
    pub segments: Vec<Segment>,
    pub pages: Vec<Page>,
    pub feature_groups: Vec<FeatureGroup>,
}

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub webhook_url: String,
}

#[derive(Debug, Clone)]
pub struct AlertConfig {
    pub url: String,
    pub topic: String,
}

/// Main configuration struct, built once at startup and passed to each component.
#[derive(Debug, Clone)]
pub struct Config {
    pub timezone: Tz,
    pub http_timeout_secs: u64,
    pub warehouse: WarehouseConfig,
    pub handoff: HandoffConfig,
    pub analytics: AnalyticsConfig,
    pub chat: ChatConfig,
    pub alerts: AlertConfig,
}

impl Config {
    /// Load configuration from an explicit path, or from config.yml / ../config.yml,
    /// or from the environment alone when no file exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_dotenv();

        if let Some(path) = path {
            return Self::load_from_file(path);
        }

        for candidate in ["config.yml", "../config.yml"] {
            if Path::new(candidate).exists() {
                return Self::load_from_file(candidate);
            }
        }

        Self::from_env()
    }

    /// Build configuration purely from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_yaml(YamlConfig::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let yaml: YamlConfig = serde_yaml::from_str(&content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config file: {}", e)))?;

        Self::from_yaml(yaml)
    }

    /// Load .env file into environment variables using dotenvy
    fn load_dotenv() {
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_filename("../.env");
        }
    }

    /// Resolve a value: prefer env var if config value looks like ${VAR}
    fn resolve_env_string(value: Option<String>, env_key: &str) -> String {
        if let Some(ref v) = value {
            if let Some(var_name) = v.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
                return std::env::var(var_name)
                    .or_else(|_| std::env::var(env_key))
                    .unwrap_or_default();
            }
            return v.clone();
        }
        std::env::var(env_key).unwrap_or_default()
    }

    fn resolve_ids(items: Vec<NamedId>) -> Vec<NamedId> {
        items
            .into_iter()
            .map(|item| NamedId {
                id: Self::resolve_env_string(Some(item.id), ""),
                name: item.name,
            })
            .collect()
    }

    fn from_yaml(yaml: YamlConfig) -> Result<Self> {
        let report = yaml.report.unwrap_or_default();
        let http = yaml.http.unwrap_or_default();
        let warehouse = yaml.warehouse.unwrap_or_default();
        let handoff = yaml.handoff.unwrap_or_default();
        let analytics = yaml.analytics.unwrap_or_default();
        let chat = yaml.chat.unwrap_or_default();
        let alerts = yaml.alerts.unwrap_or_default();

        let tz_name = Self::resolve_env_string(report.timezone, "REPORT_TIMEZONE");
        let timezone = if tz_name.is_empty() {
            DEFAULT_TIMEZONE
        } else {
            tz_name.as_str()
        }
        .parse::<Tz>()
        .map_err(|_| Error::ConfigError(format!("Unknown report timezone: {}", tz_name)))?;

        let port_raw = Self::resolve_env_string(warehouse.port, "PORT");
        let port = if port_raw.is_empty() {
            DEFAULT_WAREHOUSE_PORT
        } else {
            port_raw.parse::<u16>().map_err(|_| {
                Error::ConfigError(format!("Invalid warehouse port: {}", port_raw))
            })?
        };

        let start_raw = Self::resolve_env_string(analytics.start_date, "PENDO_START_DATE");
        let start_date = if start_raw.is_empty() {
            None
        } else {
            Some(NaiveDate::parse_from_str(&start_raw, "%Y-%m-%d").map_err(|e| {
                Error::ConfigError(format!("Invalid analytics start_date {}: {}", start_raw, e))
            })?)
        };

        let function_name = Self::resolve_env_string(handoff.function_name, "NOTIFY_FUNCTION_NAME");

        let mut segments = Self::resolve_ids(analytics.segments);
        let mut pages = Self::resolve_ids(analytics.pages);
        let mut feature_groups: Vec<FeatureGroup> = analytics
            .feature_groups
            .into_iter()
            .map(|group| FeatureGroup {
                feature_ids: group
                    .feature_ids
                    .into_iter()
                    .map(|id| Self::resolve_env_string(Some(id), ""))
                    .collect(),
                name: group.name,
            })
            .collect();

        if segments.is_empty() {
            segments = env_grid(&[("Segment-A", "SEGMENT_A_ID"), ("Segment-B", "SEGMENT_B_ID")]);
        }
        if pages.is_empty() {
            pages = env_grid(&[
                ("Web", "PAGE_WEB_ID"),
                ("iOS", "PAGE_IOS_ID"),
                ("Android", "PAGE_ANDROID_ID"),
            ]);
        }
        if feature_groups.is_empty() {
            feature_groups = env_feature_groups();
        }

        Ok(Self {
            timezone,
            http_timeout_secs: http.timeout_secs.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
            warehouse: WarehouseConfig {
                host: Self::resolve_env_string(warehouse.host, "HOST"),
                port,
                user: Self::resolve_env_string(warehouse.user, "USER"),
                password: Self::resolve_env_string(warehouse.password, "PASSWORD"),
                dbname: Self::resolve_env_string(warehouse.dbname, "DBNAME"),
            },
            handoff: HandoffConfig {
                url: Self::resolve_env_string(handoff.url, "NOTIFY_INVOKE_URL"),
                function_name: if function_name.is_empty() {
                    NOTIFY_FUNCTION_NAME.to_string()
                } else {
                    function_name
                },
            },
            analytics: AnalyticsConfig {
                api_url: Self::resolve_env_string(analytics.api_url, "PENDO_API_URL"),
                integration_key: Self::resolve_env_string(
                    analytics.integration_key,
                    "PENDO_INTEGRATION_KEY",
                ),
                start_date,
                segments,
                pages,
                feature_groups,
            },
            chat: ChatConfig {
                webhook_url: Self::resolve_env_string(chat.webhook_url, "SLACK_WEBHOOK_URL"),
            },
            alerts: AlertConfig {
                url: Self::resolve_env_string(alerts.url, "ALERT_PUBLISH_URL"),
                topic: Self::resolve_env_string(alerts.topic, "SNS_TOPIC_ARN"),
            },
        })
    }

    /// Names of required values that are missing for the given requirements.
    pub fn missing(&self, requirements: &[Requirement]) -> Vec<String> {
        fn check(missing: &mut Vec<String>, name: &str, value: &str) {
            if value.trim().is_empty() {
                missing.push(name.to_string());
            }
        }

        let mut missing = Vec::new();

        for requirement in requirements {
            match requirement {
                Requirement::Warehouse => {
                    check(&mut missing, "warehouse.host", &self.warehouse.host);
                    check(&mut missing, "warehouse.user", &self.warehouse.user);
                    check(&mut missing, "warehouse.password", &self.warehouse.password);
                    check(&mut missing, "warehouse.dbname", &self.warehouse.dbname);
                }
                Requirement::Handoff => check(&mut missing, "handoff.url", &self.handoff.url),
                Requirement::Analytics => {
                    let a = &self.analytics;
                    check(&mut missing, "analytics.api_url", &a.api_url);
                    check(&mut missing, "analytics.integration_key", &a.integration_key);
                    if a.start_date.is_none() {
                        missing.push("analytics.start_date".to_string());
                    }
                    if a.segments.is_empty() {
                        missing.push("analytics.segments".to_string());
                    }
                    if a.pages.is_empty() {
                        missing.push("analytics.pages".to_string());
                    }
                    if a.feature_groups.is_empty() {
                        missing.push("analytics.feature_groups".to_string());
                    }
                    for seg in &a.segments {
                        if seg.id.trim().is_empty() {
                            missing.push(format!("analytics.segments[{}].id", seg.name));
                        }
                    }
                    for page in &a.pages {
                        if page.id.trim().is_empty() {
                            missing.push(format!("analytics.pages[{}].id", page.name));
                        }
                    }
                    for group in &a.feature_groups {
                        if group.feature_ids.is_empty()
                            || group.feature_ids.iter().any(|id| id.trim().is_empty())
                        {
                            missing.push(format!("analytics.feature_groups[{}]", group.name));
                        }
                    }
                }
                Requirement::Chat => check(&mut missing, "chat.webhook_url", &self.chat.webhook_url),
                Requirement::Alerts => {
                    check(&mut missing, "alerts.url", &self.alerts.url);
                    check(&mut missing, "alerts.topic", &self.alerts.topic);
                }
            }
        }

        missing
    }

    /// Fail at startup if any required value is absent.
    pub fn validate(&self, requirements: &[Requirement]) -> Result<()> {
        let missing = self.missing(requirements);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::ConfigError(format!(
                "missing required values: {}",
                missing.join(", ")
            )))
        }
    }

    pub fn validate_for(&self, job: Job) -> Result<()> {
        self.validate(job.requirements())
    }
}

fn env_grid(pairs: &[(&str, &str)]) -> Vec<NamedId> {
    pairs
        .iter()
        .filter_map(|(name, key)| {
            std::env::var(key)
                .ok()
                .filter(|v| !v.is_empty())
                .map(|id| NamedId::new(name, &id))
        })
        .collect()
}

fn env_feature_groups() -> Vec<FeatureGroup> {
    let groups: [(&str, &[&str]); 2] = [
        ("Roleplay", &["FEATURE_ROLEPLAY_ID"]),
        (
            "Automation",
            &[
                "FEATURE_AUTOMATION_1_ID",
                "FEATURE_AUTOMATION_2_ID",
                "FEATURE_AUTOMATION_3_ID",
            ],
        ),
    ];

    groups
        .iter()
        .filter_map(|(name, keys)| {
            let ids: Vec<String> = keys
                .iter()
                .filter_map(|k| std::env::var(k).ok().filter(|v| !v.is_empty()))
                .collect();
            if ids.is_empty() {
                None
            } else {
                Some(FeatureGroup {
                    name: name.to_string(),
                    feature_ids: ids,
                })
            }
        })
        .collect()
}
