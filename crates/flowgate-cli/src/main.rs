//! `flowgate` — the command-line front door. Parses the `<format>-to-<sink>` subcommand
//! surface, turns the matched flags into a configuration overlay, and hands off to
//! `flowgate::run`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::error;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "flowgate", version = VERSION, about = "Streams records from a source into a message sink.")]
struct Cli {
    /// TOML file merged under FLOWGATE_* environment variables and above the baked-in defaults.
    #[arg(long, global = true)]
    config_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Default, Serialize)]
struct SourceCommonArgs {
    #[arg(long)]
    input_url: Option<String>,
    #[arg(long)]
    csv_rows_in_chunk: Option<usize>,
    #[arg(long)]
    csv_delimiter: Option<char>,
}

#[derive(Args, Clone, Default, Serialize)]
struct RuntimeArgs {
    #[arg(long)]
    default_data_source: Option<String>,
    #[arg(long)]
    default_entity_type: Option<String>,
    #[arg(long)]
    record_identifier: Option<String>,
    #[arg(long)]
    record_min: Option<u64>,
    #[arg(long)]
    record_max: Option<u64>,
    #[arg(long)]
    record_size_max: Option<usize>,
    #[arg(long)]
    records_per_message: Option<usize>,
    #[arg(long)]
    threads_per_print: Option<usize>,
    #[arg(long)]
    monitoring_period_in_seconds: Option<u64>,
    #[arg(long)]
    delay_in_seconds: Option<u64>,
}

#[derive(Args, Clone, Default, Serialize)]
struct KafkaArgs {
    #[arg(long)]
    kafka_bootstrap_server: Option<String>,
    #[arg(long)]
    kafka_topic: Option<String>,
    #[arg(long)]
    kafka_group: Option<String>,
    #[arg(long)]
    kafka_poll_interval: Option<u64>,
}

#[derive(Args, Clone, Default, Serialize)]
struct RabbitMqArgs {
    #[arg(long)]
    rabbitmq_host: Option<String>,
    #[arg(long)]
    rabbitmq_port: Option<u16>,
    #[arg(long)]
    rabbitmq_username: Option<String>,
    #[arg(long)]
    rabbitmq_password: Option<String>,
    #[arg(long)]
    rabbitmq_queue: Option<String>,
    #[arg(long)]
    rabbitmq_exchange: Option<String>,
    #[arg(long)]
    rabbitmq_routing_key: Option<String>,
    #[arg(long)]
    rabbitmq_use_existing_entities: Option<bool>,
}

#[derive(Args, Clone, Default, Serialize)]
struct SqsArgs {
    #[arg(long)]
    sqs_queue_url: Option<String>,
    #[arg(long)]
    sqs_delay_seconds: Option<i32>,
    #[arg(long)]
    sqs_batch: Option<bool>,
}

#[derive(Args, Clone, Default, Serialize)]
struct WebSocketArgs {
    #[arg(long)]
    websocket_host: Option<String>,
    #[arg(long)]
    websocket_port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(name = "avro-to-kafka")]
    AvroToKafka { #[command(flatten)] source: SourceCommonArgs, #[command(flatten)] runtime: RuntimeArgs, #[command(flatten)] kafka: KafkaArgs },
    #[command(name = "avro-to-rabbitmq")]
    AvroToRabbitMq { #[command(flatten)] source: SourceCommonArgs, #[command(flatten)] runtime: RuntimeArgs, #[command(flatten)] rabbitmq: RabbitMqArgs },
    #[command(name = "avro-to-sqs")]
    AvroToSqs { #[command(flatten)] source: SourceCommonArgs, #[command(flatten)] runtime: RuntimeArgs, #[command(flatten)] sqs: SqsArgs },
    #[command(name = "avro-to-stdout")]
    AvroToStdout { #[command(flatten)] source: SourceCommonArgs, #[command(flatten)] runtime: RuntimeArgs },

    #[command(name = "csv-to-kafka")]
    CsvToKafka { #[command(flatten)] source: SourceCommonArgs, #[command(flatten)] runtime: RuntimeArgs, #[command(flatten)] kafka: KafkaArgs },
    #[command(name = "csv-to-rabbitmq")]
    CsvToRabbitMq { #[command(flatten)] source: SourceCommonArgs, #[command(flatten)] runtime: RuntimeArgs, #[command(flatten)] rabbitmq: RabbitMqArgs },
    #[command(name = "csv-to-sqs")]
    CsvToSqs { #[command(flatten)] source: SourceCommonArgs, #[command(flatten)] runtime: RuntimeArgs, #[command(flatten)] sqs: SqsArgs },
    #[command(name = "csv-to-stdout")]
    CsvToStdout { #[command(flatten)] source: SourceCommonArgs, #[command(flatten)] runtime: RuntimeArgs },

    #[command(name = "json-to-kafka")]
    JsonToKafka { #[command(flatten)] source: SourceCommonArgs, #[command(flatten)] runtime: RuntimeArgs, #[command(flatten)] kafka: KafkaArgs },
    #[command(name = "json-to-rabbitmq")]
    JsonToRabbitMq { #[command(flatten)] source: SourceCommonArgs, #[command(flatten)] runtime: RuntimeArgs, #[command(flatten)] rabbitmq: RabbitMqArgs },
    #[command(name = "json-to-sqs")]
    JsonToSqs { #[command(flatten)] source: SourceCommonArgs, #[command(flatten)] runtime: RuntimeArgs, #[command(flatten)] sqs: SqsArgs },
    #[command(name = "json-to-stdout")]
    JsonToStdout { #[command(flatten)] source: SourceCommonArgs, #[command(flatten)] runtime: RuntimeArgs },

    #[command(name = "gzipped-json-to-kafka")]
    GzippedJsonToKafka { #[command(flatten)] source: SourceCommonArgs, #[command(flatten)] runtime: RuntimeArgs, #[command(flatten)] kafka: KafkaArgs },
    #[command(name = "gzipped-json-to-rabbitmq")]
    GzippedJsonToRabbitMq { #[command(flatten)] source: SourceCommonArgs, #[command(flatten)] runtime: RuntimeArgs, #[command(flatten)] rabbitmq: RabbitMqArgs },
    #[command(name = "gzipped-json-to-sqs")]
    GzippedJsonToSqs { #[command(flatten)] source: SourceCommonArgs, #[command(flatten)] runtime: RuntimeArgs, #[command(flatten)] sqs: SqsArgs },
    #[command(name = "gzipped-json-to-stdout")]
    GzippedJsonToStdout { #[command(flatten)] source: SourceCommonArgs, #[command(flatten)] runtime: RuntimeArgs },

    #[command(name = "parquet-to-kafka")]
    ParquetToKafka { #[command(flatten)] source: SourceCommonArgs, #[command(flatten)] runtime: RuntimeArgs, #[command(flatten)] kafka: KafkaArgs },
    #[command(name = "parquet-to-rabbitmq")]
    ParquetToRabbitMq { #[command(flatten)] source: SourceCommonArgs, #[command(flatten)] runtime: RuntimeArgs, #[command(flatten)] rabbitmq: RabbitMqArgs },
    #[command(name = "parquet-to-sqs")]
    ParquetToSqs { #[command(flatten)] source: SourceCommonArgs, #[command(flatten)] runtime: RuntimeArgs, #[command(flatten)] sqs: SqsArgs },
    #[command(name = "parquet-to-stdout")]
    ParquetToStdout { #[command(flatten)] source: SourceCommonArgs, #[command(flatten)] runtime: RuntimeArgs },

    #[command(name = "websocket-to-kafka")]
    WebSocketToKafka { #[command(flatten)] websocket: WebSocketArgs, #[command(flatten)] runtime: RuntimeArgs, #[command(flatten)] kafka: KafkaArgs },
    #[command(name = "websocket-to-rabbitmq")]
    WebSocketToRabbitMq { #[command(flatten)] websocket: WebSocketArgs, #[command(flatten)] runtime: RuntimeArgs, #[command(flatten)] rabbitmq: RabbitMqArgs },
    #[command(name = "websocket-to-sqs")]
    WebSocketToSqs { #[command(flatten)] websocket: WebSocketArgs, #[command(flatten)] runtime: RuntimeArgs, #[command(flatten)] sqs: SqsArgs },
    #[command(name = "websocket-to-stdout")]
    WebSocketToStdout { #[command(flatten)] websocket: WebSocketArgs, #[command(flatten)] runtime: RuntimeArgs },

    /// Sleeps, then exits. Used to keep a container alive for acceptance testing.
    Sleep {
        #[arg(long, default_value_t = 0)]
        seconds: u64,
    },
    /// Prints the program version and exits.
    Version,
    /// Exercises the wiring without a real sink; used by the Docker image's smoke test.
    DockerAcceptanceTest,
}

/// Folds a `#[derive(Serialize)]`-free `Args` struct into a JSON object, keeping only the keys
/// the user actually passed (`Option::None` fields are omitted so they don't shadow a lower
/// layer's default).
fn merge_present(target: &mut serde_json::Map<String, Value>, source: Value) {
    if let Value::Object(map) = source {
        for (k, v) in map {
            if !v.is_null() {
                target.insert(k, v);
            }
        }
    }
}

fn build_overrides(
    source_variant: Option<(&str, &SourceCommonArgs)>,
    websocket: Option<&WebSocketArgs>,
    runtime: &RuntimeArgs,
    sink: Option<(&str, Value)>,
) -> Result<Value> {
    let mut runtime_map = serde_json::Map::new();
    merge_present(&mut runtime_map, serde_json::to_value(runtime)?);

    let mut root = serde_json::Map::new();
    root.insert("runtime".to_string(), Value::Object(runtime_map));

    if let Some((variant, args)) = source_variant {
        let mut inner = serde_json::Map::new();
        merge_present(&mut inner, serde_json::to_value(args)?);
        root.insert("source".to_string(), json!({ variant: inner }));
    } else if let Some(ws) = websocket {
        let mut inner = serde_json::Map::new();
        merge_present(&mut inner, serde_json::to_value(ws)?);
        root.insert("source".to_string(), json!({ "WebSocket": inner }));
    }

    if let Some((variant, inner)) = sink {
        let value = if inner.is_null() { Value::String(variant.to_string()) } else { json!({ variant: inner }) };
        root.insert("sink".to_string(), value);
    }

    Ok(Value::Object(root))
}

fn sink_payload<T: serde::Serialize>(args: &T) -> Result<Value> {
    let mut inner = serde_json::Map::new();
    merge_present(&mut inner, serde_json::to_value(args)?);
    Ok(Value::Object(inner))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();

    let overrides = match &cli.command {
        Commands::Version => {
            println!("flowgate {VERSION}");
            return Ok(());
        }
        Commands::Sleep { seconds } => {
            if *seconds == 0 {
                tokio::time::sleep(std::time::Duration::MAX).await;
            } else {
                tokio::time::sleep(std::time::Duration::from_secs(*seconds)).await;
            }
            return Ok(());
        }
        Commands::DockerAcceptanceTest => {
            println!("flowgate: wiring OK");
            return Ok(());
        }

        Commands::AvroToKafka { source, runtime, kafka } => build_overrides(Some(("Avro", source)), None, runtime, Some(("Kafka", sink_payload(kafka)?)))?,
        Commands::AvroToRabbitMq { source, runtime, rabbitmq } => build_overrides(Some(("Avro", source)), None, runtime, Some(("RabbitMq", sink_payload(rabbitmq)?)))?,
        Commands::AvroToSqs { source, runtime, sqs } => build_overrides(Some(("Avro", source)), None, runtime, Some(("Sqs", sink_payload(sqs)?)))?,
        Commands::AvroToStdout { source, runtime } => build_overrides(Some(("Avro", source)), None, runtime, Some(("Stdout", Value::Null)))?,

        Commands::CsvToKafka { source, runtime, kafka } => build_overrides(Some(("Csv", source)), None, runtime, Some(("Kafka", sink_payload(kafka)?)))?,
        Commands::CsvToRabbitMq { source, runtime, rabbitmq } => build_overrides(Some(("Csv", source)), None, runtime, Some(("RabbitMq", sink_payload(rabbitmq)?)))?,
        Commands::CsvToSqs { source, runtime, sqs } => build_overrides(Some(("Csv", source)), None, runtime, Some(("Sqs", sink_payload(sqs)?)))?,
        Commands::CsvToStdout { source, runtime } => build_overrides(Some(("Csv", source)), None, runtime, Some(("Stdout", Value::Null)))?,

        Commands::JsonToKafka { source, runtime, kafka } => build_overrides(Some(("Json", source)), None, runtime, Some(("Kafka", sink_payload(kafka)?)))?,
        Commands::JsonToRabbitMq { source, runtime, rabbitmq } => build_overrides(Some(("Json", source)), None, runtime, Some(("RabbitMq", sink_payload(rabbitmq)?)))?,
        Commands::JsonToSqs { source, runtime, sqs } => build_overrides(Some(("Json", source)), None, runtime, Some(("Sqs", sink_payload(sqs)?)))?,
        Commands::JsonToStdout { source, runtime } => build_overrides(Some(("Json", source)), None, runtime, Some(("Stdout", Value::Null)))?,

        Commands::GzippedJsonToKafka { source, runtime, kafka } => build_overrides(Some(("GzippedJson", source)), None, runtime, Some(("Kafka", sink_payload(kafka)?)))?,
        Commands::GzippedJsonToRabbitMq { source, runtime, rabbitmq } => build_overrides(Some(("GzippedJson", source)), None, runtime, Some(("RabbitMq", sink_payload(rabbitmq)?)))?,
        Commands::GzippedJsonToSqs { source, runtime, sqs } => build_overrides(Some(("GzippedJson", source)), None, runtime, Some(("Sqs", sink_payload(sqs)?)))?,
        Commands::GzippedJsonToStdout { source, runtime } => build_overrides(Some(("GzippedJson", source)), None, runtime, Some(("Stdout", Value::Null)))?,

        Commands::ParquetToKafka { source, runtime, kafka } => build_overrides(Some(("Parquet", source)), None, runtime, Some(("Kafka", sink_payload(kafka)?)))?,
        Commands::ParquetToRabbitMq { source, runtime, rabbitmq } => build_overrides(Some(("Parquet", source)), None, runtime, Some(("RabbitMq", sink_payload(rabbitmq)?)))?,
        Commands::ParquetToSqs { source, runtime, sqs } => build_overrides(Some(("Parquet", source)), None, runtime, Some(("Sqs", sink_payload(sqs)?)))?,
        Commands::ParquetToStdout { source, runtime } => build_overrides(Some(("Parquet", source)), None, runtime, Some(("Stdout", Value::Null)))?,

        Commands::WebSocketToKafka { websocket, runtime, kafka } => build_overrides(None, Some(websocket), runtime, Some(("Kafka", sink_payload(kafka)?)))?,
        Commands::WebSocketToRabbitMq { websocket, runtime, rabbitmq } => build_overrides(None, Some(websocket), runtime, Some(("RabbitMq", sink_payload(rabbitmq)?)))?,
        Commands::WebSocketToSqs { websocket, runtime, sqs } => build_overrides(None, Some(websocket), runtime, Some(("Sqs", sink_payload(sqs)?)))?,
        Commands::WebSocketToStdout { websocket, runtime } => build_overrides(None, Some(websocket), runtime, Some(("Stdout", Value::Null)))?,
    };

    let app_config = flowgate::config::load_config(cli.config_file.as_deref(), figment::value::Value::serialize(&overrides)?)
        .context("could not resolve configuration from flags, FLOWGATE_* environment variables, and the config file")?;

    let result = flowgate::run(app_config).await;

    if let Err(err) = result {
        error!("{err}");
        let mut looks_unreachable = false;
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
            let text = cause.to_string();
            if text.contains("connection refused") || text.contains("Connection refused") || text.contains("dns error") || text.contains("tcp connect") {
                looks_unreachable = true;
            }
        }
        if looks_unreachable {
            error!("hint: the sink or source endpoint may not be reachable; check it is running and the configured host/port are correct");
        }
        std::process::exit(1);
    }

    Ok(())
}
