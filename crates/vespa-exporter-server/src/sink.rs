use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use vespa_exporter_metrics::MetricsRegistry;

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub fn metrics_router(registry: Arc<MetricsRegistry>) -> Router {
    Router::new()
        .route("/", get(prometheus_metrics))
        .route("/metrics", get(prometheus_metrics))
        .with_state(registry)
}

pub async fn prometheus_metrics(State(registry): State<Arc<MetricsRegistry>>) -> impl IntoResponse {
    let mut response = Response::new(Body::from(registry.render_prometheus()));
    *response.status_mut() = StatusCode::OK;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE));
    response
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::net::TcpListener;
    use vespa_exporter_metrics::MetricsRegistry;

    use super::{CONTENT_TYPE, metrics_router};

    #[tokio::test]
    async fn serves_rendered_registry() {
        let registry = Arc::new(MetricsRegistry::new());
        registry
            .ensure_gauge("vespa_distributor_status_code_up", "Status code up?", &["host"])
            .unwrap()
            .set(&[("host", "h1:19111")], 1.0)
            .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, metrics_router(registry)).await;
        });

        for path in ["/metrics", "/"] {
            let response = reqwest::get(format!("http://{addr}{path}")).await.unwrap();
            assert!(response.status().is_success());
            assert_eq!(
                response.headers()[reqwest::header::CONTENT_TYPE],
                CONTENT_TYPE
            );
            let body = response.text().await.unwrap();
            assert!(body.contains("vespa_distributor_status_code_up{host=\"h1:19111\"} 1\n"));
        }
    }
}
