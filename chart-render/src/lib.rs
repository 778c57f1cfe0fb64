//! Candlestick chart pages rendered with ECharts.

use serde_json::{json, Value};
use thiserror::Error;
use ts_core::Candle;

pub const DEFAULT_ECHARTS_URL: &str =
    "https://go-echarts.github.io/go-echarts-assets/assets/echarts.min.js";

const COLOR_UP: &str = "#00da3c";
const COLOR_DOWN: &str = "#ec0000";
const BORDER_UP: &str = "#008F28";
const BORDER_DOWN: &str = "#8A0000";

/// Initial zoom window in percent; 21 hides the slots before the slow SMA
/// has a value.
const ZOOM_START: u32 = 21;
const ZOOM_END: u32 = 100;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("series `{name}` has {got} points, expected {expected}")]
    Misaligned {
        name: String,
        got: usize,
        expected: usize,
    },
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Auxiliary line drawn over the candles.
#[derive(Debug, Clone, Copy)]
pub struct LineSeries<'a> {
    pub name: &'a str,
    pub values: &'a [Option<f64>],
}

impl<'a> LineSeries<'a> {
    pub fn new(name: &'a str, values: &'a [Option<f64>]) -> Self {
        Self { name, values }
    }
}

/// Everything one chart needs; lines are checked to be index-aligned with
/// the candles on construction.
#[derive(Debug, Clone, Copy)]
pub struct ChartData<'a> {
    asset: &'a str,
    candles: &'a [Candle],
    lines: &'a [LineSeries<'a>],
}

impl<'a> ChartData<'a> {
    pub fn new(
        asset: &'a str,
        candles: &'a [Candle],
        lines: &'a [LineSeries<'a>],
    ) -> Result<Self, RenderError> {
        if let Some(bad) = lines.iter().find(|l| l.values.len() != candles.len()) {
            return Err(RenderError::Misaligned {
                name: bad.name.to_string(),
                got: bad.values.len(),
                expected: candles.len(),
            });
        }
        Ok(Self {
            asset,
            candles,
            lines,
        })
    }

    pub fn asset(&self) -> &str {
        self.asset
    }

    pub fn candles(&self) -> &[Candle] {
        self.candles
    }

    pub fn lines(&self) -> &[LineSeries<'a>] {
        self.lines
    }

    /// `"{asset} - {last close}"`, or just the asset when there are no candles.
    pub fn title(&self) -> String {
        match self.candles.last() {
            Some(last) => format!("{} - {}", self.asset, format_sig5(last.close())),
            None => self.asset.to_string(),
        }
    }

    /// `"{last low} - {last high}"`.
    pub fn subtitle(&self) -> String {
        self.candles
            .last()
            .map(|last| format!("{} - {}", format_sig5(last.low()), format_sig5(last.high())))
            .unwrap_or_default()
    }
}

/// Turns chart data into a self-contained page.
pub trait ChartRenderer: Send + Sync {
    fn render(&self, chart: &ChartData<'_>) -> Result<String, RenderError>;
}

#[derive(Debug, Clone)]
pub struct EChartsRenderer {
    asset_url: String,
    width: String,
    height: String,
}

impl Default for EChartsRenderer {
    fn default() -> Self {
        Self {
            asset_url: DEFAULT_ECHARTS_URL.to_string(),
            width: "900px".to_string(),
            height: "500px".to_string(),
        }
    }
}

impl EChartsRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset_url(mut self, url: impl Into<String>) -> Self {
        self.asset_url = url.into();
        self
    }

    /// ECharts option object for the chart.
    pub fn option(&self, chart: &ChartData<'_>) -> Value {
        let labels: Vec<&str> = chart.candles.iter().map(|c| c.time.as_str()).collect();
        let ohlc: Vec<[f64; 4]> = chart.candles.iter().map(|c| c.ohlc.as_array()).collect();

        let mut series = vec![json!({
            "name": chart.asset,
            "type": "candlestick",
            "data": ohlc,
            "itemStyle": {
                "color": COLOR_UP,
                "color0": COLOR_DOWN,
                "borderColor": BORDER_UP,
                "borderColor0": BORDER_DOWN,
            },
            "markPoint": {
                "symbol": ["pin"],
                "label": { "show": true },
                "data": [
                    { "name": "Maximum", "type": "max", "valueDim": "highest" },
                    { "name": "Minimum", "type": "min", "valueDim": "lowest" },
                ],
            },
        })];
        series.extend(chart.lines.iter().map(|line| {
            json!({
                "name": line.name,
                "type": "line",
                "showSymbol": false,
                "data": line_points(line.values),
            })
        }));

        json!({
            "title": { "text": chart.title(), "subtext": chart.subtitle() },
            "tooltip": { "show": true, "trigger": "axis" },
            "legend": { "show": true },
            "toolbox": {
                "show": true,
                "right": "20%",
                "feature": {
                    "saveAsImage": { "show": true, "type": "png", "title": "save as image" },
                },
            },
            "dataZoom": [{
                "type": "slider",
                "start": ZOOM_START,
                "end": ZOOM_END,
                "xAxisIndex": [0],
            }],
            "xAxis": [{ "data": labels, "splitNumber": 20 }],
            "yAxis": [{ "scale": true }],
            "series": series,
        })
    }
}

impl ChartRenderer for EChartsRenderer {
    fn render(&self, chart: &ChartData<'_>) -> Result<String, RenderError> {
        let option = script_safe(&serde_json::to_string(&self.option(chart))?);
        let title = escape_html(&chart.title());
        let asset_url = escape_html(&self.asset_url);
        let (width, height) = (escape_html(&self.width), escape_html(&self.height));
        Ok(format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{title}</title>
    <script src="{asset_url}"></script>
</head>
<body>
<div class="container">
    <div class="item" id="chart" style="width:{width};height:{height};"></div>
</div>
<script type="text/javascript">
    "use strict";
    let chart = echarts.init(document.getElementById('chart'), "white", {{ renderer: "canvas" }});
    let option = {option};
    chart.setOption(option);
</script>
<style>
    .container {{margin-top:30px; display: flex;justify-content: center;align-items: center;}}
    .item {{margin: auto;}}
</style>
</body>
</html>
"#
        ))
    }
}

/// Undefined points become `"-"`, which ECharts skips.
fn line_points(values: &[Option<f64>]) -> Vec<Value> {
    values
        .iter()
        .map(|v| match v {
            Some(x) if x.is_finite() => json!(x),
            _ => json!("-"),
        })
        .collect()
}

/// JSON escapes for the markup-significant characters, so no string in the
/// option can open a comment or close the inline script block.
fn script_safe(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for ch in json.chars() {
        match ch {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            _ => out.push(ch),
        }
    }
    out
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Five significant digits in the style of `%.5g`.
pub fn format_sig5(value: f64) -> String {
    format_significant(value, 5)
}

/// Shortest `%g`-style rendering with `precision` significant digits:
/// plain notation for exponents in `[-4, precision)`, scientific otherwise,
/// trailing zeros trimmed.
pub fn format_significant(value: f64, precision: usize) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    let precision = precision.max(1);
    let sci = format!("{:.*e}", precision - 1, value);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    if exp < -4 || exp >= precision as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_fraction(mantissa), exp.abs())
    } else {
        let decimals = (precision as i32 - 1 - exp).max(0) as usize;
        trim_fraction(&format!("{value:.decimals$}"))
    }
}

fn trim_fraction(s: &str) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s.to_string()
    }
}
