use std::{path::PathBuf, time::Duration};

use url::Url;
use vespa_exporter_common::error::{ExporterError, Result};
use vespa_exporter_metrics::AllowList;

pub const DEFAULT_CONFIG_SERVER: &str = "localhost:19071";
pub const DEFAULT_NAMESPACE: &str = "vespa";
pub const MODEL_PATH: &str =
    "/config/v2/tenant/default/application/default/cloud.config.model/client";
pub const METRICS_PATH: &str = "/state/v1/metrics";

#[derive(Debug, Clone)]
pub struct ExporterConfig {
    pub config_server: String,
    pub namespace: String,
    pub interval: Duration,
    pub request_timeout: Duration,
    pub max_concurrent_fetches: usize,
    pub allow_list_file: Option<PathBuf>,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            config_server: DEFAULT_CONFIG_SERVER.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            interval: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
            max_concurrent_fetches: 64,
            allow_list_file: None,
        }
    }
}

impl ExporterConfig {
    pub fn model_url(&self) -> Result<Url> {
        let base = ensure_http_scheme(self.config_server.trim().trim_end_matches('/'));
        Url::parse(&base)
            .and_then(|base| base.join(MODEL_PATH))
            .map_err(|err| {
                ExporterError::InvalidArgument(format!(
                    "invalid config server address {}: {err}",
                    self.config_server
                ))
            })
    }

    pub fn load_allow_list(&self) -> Result<AllowList> {
        match &self.allow_list_file {
            Some(path) => AllowList::load(path),
            None => Ok(AllowList::permit_all()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(ExporterError::InvalidArgument(
                "collection interval must be positive".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ExporterError::InvalidArgument(
                "request timeout must be positive".to_string(),
            ));
        }
        if self.max_concurrent_fetches == 0 {
            return Err(ExporterError::InvalidArgument(
                "at least one concurrent fetch is required".to_string(),
            ));
        }
        self.model_url().map(|_| ())
    }

    pub(crate) fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .map_err(|err| ExporterError::InternalError(format!("failed to build http client: {err}")))
    }
}

fn ensure_http_scheme(endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::ExporterConfig;

    #[test]
    fn model_url_accepts_host_port_and_base_urls() {
        let config = ExporterConfig::default();
        assert_eq!(
            config.model_url().unwrap().as_str(),
            "http://localhost:19071/config/v2/tenant/default/application/default/cloud.config.model/client"
        );

        let config = ExporterConfig {
            config_server: "https://cfg.example.com:19071/".to_string(),
            ..ExporterConfig::default()
        };
        assert_eq!(
            config.model_url().unwrap().as_str(),
            "https://cfg.example.com:19071/config/v2/tenant/default/application/default/cloud.config.model/client"
        );
    }

    #[test]
    fn validate_rejects_degenerate_settings() {
        assert!(ExporterConfig::default().validate().is_ok());

        let config = ExporterConfig {
            interval: Duration::ZERO,
            ..ExporterConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ExporterConfig {
            max_concurrent_fetches: 0,
            ..ExporterConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ExporterConfig {
            config_server: "http://[bad".to_string(),
            ..ExporterConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_allow_list_file_permits_all() {
        let allow_list = ExporterConfig::default().load_allow_list().unwrap();
        assert!(allow_list.is_empty());
        assert!(allow_list.permitted("anything"));
    }
}
