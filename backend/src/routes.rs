use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use chart_render::{ChartData, LineSeries};
use serde::Deserialize;
use ta_engine::IndicatorSet;
use ts_core::normalize;

use crate::error::ChartError;
use crate::state::AppState;

/// Query string of the chart endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ChartParams {
    /// Asset override.
    a: Option<String>,
    /// Timeframe override, passed to the quote API as a path segment.
    t: Option<String>,
}

impl ChartParams {
    fn asset<'a>(&'a self, default: &'a str) -> &'a str {
        self.a
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(default)
    }

    fn timeframe(&self) -> Option<&str> {
        self.t.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(chart_handler))
        .route("/chart", get(chart_handler))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn chart_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ChartParams>,
) -> Result<Html<String>, ChartError> {
    let asset = params.asset(&state.config.default_asset);
    let timeframe = params.timeframe();

    match build_chart(&state, asset, timeframe).await {
        Ok(page) => Ok(Html(page)),
        Err(e) => {
            tracing::warn!(
                asset,
                ?timeframe,
                timeout = e.is_timeout(),
                error = %e,
                "chart request failed"
            );
            Err(e)
        }
    }
}

/// Fetch, normalize, compute indicators and render. All buffers are local to
/// this call.
async fn build_chart(
    state: &AppState,
    asset: &str,
    timeframe: Option<&str>,
) -> Result<String, ChartError> {
    let quotes = state.quotes.fetch(asset, timeframe).await?;
    let candles = normalize(&quotes.bars, state.config.zone);
    let indicators = IndicatorSet::default_pair(&candles);
    let lines: Vec<LineSeries<'_>> = indicators
        .series()
        .iter()
        .map(|s| LineSeries::new(s.label(), &s.values))
        .collect();

    let chart = ChartData::new(asset, &candles, &lines)?;
    let page = state.renderer.render(&chart)?;
    tracing::info!(
        asset,
        ?timeframe,
        bars = candles.len(),
        interval = %quotes.default_interval,
        "rendered chart"
    );
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::error::CHART_ERROR_MESSAGE;
    use async_trait::async_trait;
    use axum::body::to_bytes;
    use axum::http::{header, StatusCode};
    use axum::response::IntoResponse;
    use chart_render::{ChartRenderer, EChartsRenderer, RenderError};
    use chrono_tz::Tz;
    use quote_client::{QuoteError, QuoteSource};
    use std::sync::Mutex;
    use std::time::Duration;
    use ts_core::{QuoteSet, RawBar};

    fn test_config() -> ServerConfig {
        ServerConfig {
            bind: "127.0.0.1".to_string(),
            port: 0,
            api_url: "http://quotes.invalid/".to_string(),
            default_asset: "WIG20".to_string(),
            quote_timeout: Duration::from_secs(5),
            zone_name: "UTC".to_string(),
            zone: Tz::UTC,
            echarts_url: chart_render::DEFAULT_ECHARTS_URL.to_string(),
        }
    }

    fn rising_quotes(n: usize) -> QuoteSet {
        QuoteSet {
            default_interval: "1m".to_string(),
            reference_price: 100.0,
            bars: (0..n)
                .map(|i| {
                    let c = 100.0 + i as f64;
                    RawBar::new(i as i64 * 60_000, c - 0.5, c + 1.0, c - 1.0, c)
                })
                .collect(),
        }
    }

    enum Reply {
        Bars(usize),
        Fail(fn() -> QuoteError),
    }

    /// Records every call and answers with a canned reply.
    struct StubQuotes {
        reply: Reply,
        calls: Mutex<Vec<(String, Option<String>)>>,
    }

    impl StubQuotes {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(String, Option<String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl QuoteSource for StubQuotes {
        async fn fetch(
            &self,
            asset: &str,
            timeframe: Option<&str>,
        ) -> Result<QuoteSet, QuoteError> {
            self.calls
                .lock()
                .unwrap()
                .push((asset.to_string(), timeframe.map(str::to_string)));
            match &self.reply {
                Reply::Bars(n) => Ok(rising_quotes(*n)),
                Reply::Fail(make) => Err(make()),
            }
        }
    }

    /// Describes what it was given instead of drawing it.
    struct SummaryRenderer;

    impl ChartRenderer for SummaryRenderer {
        fn render(&self, chart: &ChartData<'_>) -> Result<String, RenderError> {
            let lines = chart
                .lines()
                .iter()
                .map(|l| {
                    let first = l.values.iter().position(Option::is_some);
                    format!("{}:{}:{:?}", l.name, l.values.len(), first)
                })
                .collect::<Vec<_>>()
                .join(",");
            Ok(format!(
                "asset={} candles={} lines={}",
                chart.asset(),
                chart.candles().len(),
                lines
            ))
        }
    }

    async fn call(
        quotes: Arc<StubQuotes>,
        renderer: Arc<dyn ChartRenderer>,
        params: ChartParams,
    ) -> (StatusCode, Option<String>, String) {
        let state = AppState::new(test_config(), quotes, renderer);
        let resp = chart_handler(State(state), Query(params)).await.into_response();
        let status = resp.status();
        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn full_window_renders_aligned_series() {
        let quotes = StubQuotes::new(Reply::Bars(100));
        let (status, ctype, body) =
            call(quotes.clone(), Arc::new(SummaryRenderer), ChartParams::default()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(ctype.unwrap().starts_with("text/html"));
        assert_eq!(
            body,
            "asset=WIG20 candles=100 lines=MA0:100:Some(9),MA1:100:Some(19)"
        );
        assert_eq!(quotes.calls(), vec![("WIG20".to_string(), None)]);
    }

    #[tokio::test]
    async fn oversized_response_is_capped() {
        let quotes = StubQuotes::new(Reply::Bars(150));
        let (status, _, body) =
            call(quotes, Arc::new(SummaryRenderer), ChartParams::default()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("candles=100 "));
    }

    #[tokio::test]
    async fn short_response_has_no_stale_slots() {
        let quotes = StubQuotes::new(Reply::Bars(12));
        let (status, _, body) =
            call(quotes, Arc::new(SummaryRenderer), ChartParams::default()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "asset=WIG20 candles=12 lines=MA0:12:Some(9),MA1:12:None");
    }

    #[tokio::test]
    async fn query_overrides_asset_and_timeframe_per_request() {
        let quotes = StubQuotes::new(Reply::Bars(30));
        let params = ChartParams {
            a: Some("KGHM".to_string()),
            t: Some("1d".to_string()),
        };
        let (_, _, body) = call(quotes.clone(), Arc::new(SummaryRenderer), params).await;
        assert!(body.starts_with("asset=KGHM "));

        // a blank override falls back to the configured default
        let params = ChartParams {
            a: Some("  ".to_string()),
            t: Some("".to_string()),
        };
        let (_, _, body) = call(quotes.clone(), Arc::new(SummaryRenderer), params).await;
        assert!(body.starts_with("asset=WIG20 "));

        assert_eq!(
            quotes.calls(),
            vec![
                ("KGHM".to_string(), Some("1d".to_string())),
                ("WIG20".to_string(), None),
            ]
        );
    }

    #[tokio::test]
    async fn upstream_failure_returns_fixed_message() {
        let quotes = StubQuotes::new(Reply::Fail(|| QuoteError::Status(503)));
        let (status, ctype, body) =
            call(quotes, Arc::new(EChartsRenderer::new()), ChartParams::default()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(ctype.unwrap().starts_with("text/plain"));
        assert_eq!(body, CHART_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn malformed_or_empty_upstream_is_recoverable() {
        for make in [
            (|| QuoteError::Malformed("expected value".to_string())) as fn() -> QuoteError,
            || QuoteError::Empty,
        ] {
            let quotes = StubQuotes::new(Reply::Fail(make));
            let (status, _, body) =
                call(quotes, Arc::new(SummaryRenderer), ChartParams::default()).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body, CHART_ERROR_MESSAGE);
        }

        // the same state keeps serving afterwards
        let quotes = StubQuotes::new(Reply::Bars(5));
        let (status, _, _) = call(quotes, Arc::new(SummaryRenderer), ChartParams::default()).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn unreachable_upstream_returns_fixed_message() {
        let source = quote_client::HttpQuoteSource::new(
            quote_client::QuoteSourceConfig::new("http://127.0.0.1:1/")
                .with_timeout(Duration::from_secs(2)),
        )
        .unwrap();
        let state = AppState::new(
            test_config(),
            Arc::new(source),
            Arc::new(EChartsRenderer::new()),
        );
        let resp = chart_handler(State(state), Query(ChartParams::default()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], CHART_ERROR_MESSAGE.as_bytes());
    }

    #[tokio::test]
    async fn echarts_page_is_returned_verbatim() {
        let quotes = StubQuotes::new(Reply::Bars(100));
        let (status, _, body) =
            call(quotes, Arc::new(EChartsRenderer::new()), ChartParams::default()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<title>WIG20 - 199</title>"));
        assert!(body.contains(r#""type":"candlestick""#));
        assert!(body.contains(r#""name":"MA0""#));
        assert!(body.contains(r#""name":"MA1""#));
        assert!(body.contains("Jan  1 01:39"));
    }
}
