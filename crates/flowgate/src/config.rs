//! Configuration surface: every tunable resolves from, in order of precedence, an environment
//! variable, a TOML file, or a compiled-in default. CLI flags (see `flowgate-cli`) are layered
//! in above both by the caller before `load_config` ever runs.

use std::path::Path;

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::publish::kafka::KafkaSinkConfig;
use crate::publish::rabbitmq::RabbitMqSinkConfig;
use crate::publish::sqs::SqsSinkConfig;
use crate::transport::websocket::WebSocketSourceConfig;

fn default_csv_rows_in_chunk() -> usize {
    10_000
}

fn default_csv_delimiter() -> char {
    ','
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CommonSourceConfig {
    #[serde(default = "default_csv_rows_in_chunk")]
    pub csv_rows_in_chunk: usize,
    #[serde(default = "default_csv_delimiter")]
    pub csv_delimiter: char,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UrlSourceConfig {
    pub input_url: String,
    #[serde(default, flatten)]
    pub common: CommonSourceConfig,
}

/// Resolved from the `<format>` half of the `<format>-to-<sink>` subcommand.
#[derive(Debug, Deserialize, Clone)]
pub enum SourceConfig {
    Json(UrlSourceConfig),
    GzippedJson(UrlSourceConfig),
    Csv(UrlSourceConfig),
    Parquet(UrlSourceConfig),
    Avro(UrlSourceConfig),
    WebSocket(WebSocketSourceConfig),
}

/// Resolved from the `<sink>` half of the `<format>-to-<sink>` subcommand.
#[derive(Debug, Deserialize, Clone)]
pub enum SinkConfig {
    Stdout,
    Kafka(KafkaSinkConfig),
    RabbitMq(RabbitMqSinkConfig),
    Sqs(SqsSinkConfig),
}

fn default_read_queue_maxsize() -> usize {
    50
}

fn default_threads_per_print() -> usize {
    4
}

fn default_record_identifier() -> String {
    "RECORD_ID".to_string()
}

fn default_record_monitor() -> u64 {
    10_000
}

fn default_records_per_message() -> usize {
    1
}

fn default_monitoring_period_in_seconds() -> u64 {
    600
}

/// The knobs that apply regardless of which format and sink were chosen.
#[derive(Debug, Deserialize, Clone)]
pub struct RuntimeConfig {
    #[serde(default = "default_read_queue_maxsize")]
    pub read_queue_maxsize: usize,
    #[serde(default = "default_threads_per_print")]
    pub threads_per_print: usize,
    #[serde(default)]
    pub record_min: Option<u64>,
    #[serde(default)]
    pub record_max: Option<u64>,
    #[serde(default)]
    pub record_size_max: usize,
    #[serde(default = "default_record_identifier")]
    pub record_identifier: String,
    #[serde(default = "default_record_monitor")]
    pub record_monitor: u64,
    #[serde(default = "default_records_per_message")]
    pub records_per_message: usize,
    #[serde(default = "default_monitoring_period_in_seconds")]
    pub monitoring_period_in_seconds: u64,
    #[serde(default)]
    pub delay_in_seconds: u64,
    #[serde(default)]
    pub default_data_source: Option<String>,
    #[serde(default)]
    pub default_entity_type: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            read_queue_maxsize: default_read_queue_maxsize(),
            threads_per_print: default_threads_per_print(),
            record_min: None,
            record_max: None,
            record_size_max: 0,
            record_identifier: default_record_identifier(),
            record_monitor: default_record_monitor(),
            records_per_message: default_records_per_message(),
            monitoring_period_in_seconds: default_monitoring_period_in_seconds(),
            delay_in_seconds: 0,
            default_data_source: None,
            default_entity_type: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub sink: SinkConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// Merges an optional TOML file with `FLOWGATE_*` environment variables (environment wins on
/// conflicts), then layers `cli_overrides` on top. `cli_overrides` is whatever the CLI already
/// parsed from flags; it is merged in last so flags win over everything, giving
/// CLI > environment > file > built-in default precedence.
pub fn load_config(config_file: Option<&Path>, cli_overrides: figment::value::Value) -> anyhow::Result<AppConfig> {
    info!(config_file = ?config_file, "loading configuration");

    let mut figment = Figment::new();
    if let Some(path) = config_file {
        figment = figment.merge(Toml::file(path));
    }
    figment = figment.merge(Env::prefixed("FLOWGATE_"));
    figment = figment.merge(figment::providers::Serialized::defaults(cli_overrides));

    let context_msg = match config_file {
        Some(path) => format!("failed to parse configuration from '{}' and FLOWGATE_* environment variables", path.display()),
        None => "failed to parse configuration from FLOWGATE_* environment variables and CLI flags".to_string(),
    };

    figment.extract().context(context_msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_defaults_match_documented_values() {
        let runtime = RuntimeConfig::default();
        assert_eq!(runtime.read_queue_maxsize, 50);
        assert_eq!(runtime.threads_per_print, 4);
        assert_eq!(runtime.record_identifier, "RECORD_ID");
        assert_eq!(runtime.record_monitor, 10_000);
        assert_eq!(runtime.records_per_message, 1);
        assert_eq!(runtime.monitoring_period_in_seconds, 600);
    }
}
