mod sink;

use std::{future::IntoFuture, net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, filter::ParseError};
use vespa_exporter_collector::{
    CollectionCycle, ExporterConfig,
    config::{DEFAULT_CONFIG_SERVER, DEFAULT_NAMESPACE},
};
use vespa_exporter_metrics::MetricsRegistry;

#[derive(Parser)]
#[command(name = "vespa-exporter", about = "Prometheus exporter for Vespa clusters")]
struct Cli {
    #[arg(long, env = "VESPA_CONFIGSERVER", default_value = DEFAULT_CONFIG_SERVER)]
    config_server: String,

    #[arg(long, env = "VESPA_METRICS_WHITELIST_FILE")]
    metrics_allowlist_file: Option<PathBuf>,

    #[arg(long, env = "LOG_LEVEL", default_value = "DEBUG")]
    log_level: String,

    #[arg(long, env = "VESPA_EXPORTER_LISTEN", default_value = "0.0.0.0:9426")]
    listen: SocketAddr,

    #[arg(long, env = "VESPA_EXPORTER_INTERVAL_SECS", default_value_t = 30)]
    interval_secs: u64,

    #[arg(long, env = "VESPA_EXPORTER_TIMEOUT_SECS", default_value_t = 10)]
    timeout_secs: u64,

    #[arg(long, env = "VESPA_EXPORTER_MAX_CONCURRENT_FETCHES", default_value_t = 64)]
    max_concurrent_fetches: usize,
}

impl Cli {
    fn exporter_config(&self) -> ExporterConfig {
        ExporterConfig {
            config_server: self.config_server.clone(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            interval: Duration::from_secs(self.interval_secs),
            request_timeout: Duration::from_secs(self.timeout_secs),
            max_concurrent_fetches: self.max_concurrent_fetches,
            allow_list_file: self.metrics_allowlist_file.clone(),
        }
    }
}

fn env_filter(log_level: &str) -> Result<EnvFilter, ParseError> {
    let level = match log_level.trim().to_ascii_uppercase().as_str() {
        "CRITICAL" | "FATAL" | "ERROR" => "error",
        "WARNING" | "WARN" => "warn",
        "INFO" => "info",
        "DEBUG" => "debug",
        "TRACE" | "NOTSET" => "trace",
        _ => return EnvFilter::try_new(log_level),
    };
    EnvFilter::try_new(format!("{level},hyper=info,hyper_util=info,reqwest=info"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(&cli.log_level)?)
        .init();

    let config = cli.exporter_config();
    let allow_list = config.load_allow_list()?;
    let registry = Arc::new(MetricsRegistry::new());
    let cycle = CollectionCycle::new(&config, Arc::clone(&registry), allow_list)?;

    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    info!(
        listen = %cli.listen,
        config_server = %cycle.discovery().model_url(),
        interval_secs = config.interval.as_secs(),
        "vespa exporter listening"
    );
    let server = axum::serve(listener, sink::metrics_router(registry)).into_future();

    tokio::select! {
        result = server => result?,
        () = cycle.run() => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("interrupted, exiting");
        }
    }

    Ok(())
}
