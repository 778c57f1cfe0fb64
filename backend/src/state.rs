use std::sync::Arc;

use chart_render::{ChartRenderer, EChartsRenderer};
use quote_client::{HttpQuoteSource, QuoteError, QuoteSource, QuoteSourceConfig};

use crate::config::ServerConfig;

/// Shared, read-only application state. Per-request buffers never live here.
pub struct AppState {
    pub config: ServerConfig,
    pub quotes: Arc<dyn QuoteSource>,
    pub renderer: Arc<dyn ChartRenderer>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        quotes: Arc<dyn QuoteSource>,
        renderer: Arc<dyn ChartRenderer>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            quotes,
            renderer,
        })
    }

    /// HTTP quote source and ECharts renderer built from the config.
    pub fn from_config(config: ServerConfig) -> Result<Arc<Self>, QuoteError> {
        let source_cfg =
            QuoteSourceConfig::new(config.api_url.clone()).with_timeout(config.quote_timeout);
        let quotes = HttpQuoteSource::new(source_cfg)?;
        let client_cfg = quotes.config();
        tracing::info!(
            user_agent = %client_cfg.user_agent,
            timeout_ms = client_cfg.timeout.as_millis() as u64,
            "quote client ready"
        );
        let renderer = EChartsRenderer::new().with_asset_url(config.echarts_url.clone());
        Ok(Self::new(config, Arc::new(quotes), Arc::new(renderer)))
    }
}
