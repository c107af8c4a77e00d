use serde::de::DeserializeOwned;
use url::Url;
use vespa_exporter_common::error::{ExporterError, Result};

pub(crate) async fn get_json<T: DeserializeOwned>(client: &reqwest::Client, url: &Url) -> Result<T> {
    let transport = |source| ExporterError::Transport {
        target: url.to_string(),
        source,
    };

    let body = client
        .get(url.clone())
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(transport)?
        .bytes()
        .await
        .map_err(transport)?;

    serde_json::from_slice(&body).map_err(|source| ExporterError::MalformedResponse {
        target: url.to_string(),
        source,
    })
}
