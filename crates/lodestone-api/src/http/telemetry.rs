//! Per-route request counting.

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use lodestone_telemetry::Metrics;

/// Count a request under its route template and response status.
///
/// Installed as a route layer so `MatchedPath` is present; the raw path is a
/// fallback that only shows up for requests routed outside the table.
pub(crate) async fn record_http_metrics(
    State(telemetry): State<Metrics>,
    matched: Option<MatchedPath>,
    request: Request,
    next: Next,
) -> Response {
    let route = matched.map_or_else(
        || request.uri().path().to_string(),
        |path| path.as_str().to_string(),
    );
    let response = next.run(request).await;
    telemetry.inc_http_request(&route, response.status().as_u16());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::StatusCode, middleware, routing::get};
    use tower::ServiceExt;

    #[tokio::test]
    async fn counts_by_route_template() -> anyhow::Result<()> {
        let metrics = Metrics::new()?;
        let router = Router::new()
            .route("/api/status/{id}", get(|| async { StatusCode::NOT_FOUND }))
            .route_layer(middleware::from_fn_with_state(
                metrics.clone(),
                record_http_metrics,
            ));
        let request = axum::http::Request::builder()
            .uri("/api/status/abc")
            .body(Body::empty())?;
        let response = router.oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let rendered = metrics.render()?;
        assert!(rendered.contains("code=\"404\""));
        assert!(rendered.contains("route=\"/api/status/{id}\""));
        Ok(())
    }
}
