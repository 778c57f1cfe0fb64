use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Milliseconds since Unix epoch.
pub type Timestamp = i64;

/// Maximum number of bars kept per quote response.
pub const BAR_WINDOW: usize = 100;

/// Candle label layout: abbreviated month, space-padded day, 24h time, no year
/// (e.g. `"Jan  1 00:00"`).
pub const TIME_LABEL_FORMAT: &str = "%b %e %H:%M";

/// One bar as sent by the quote API: `[timestamp_ms, open, high, low, close]`.
///
/// Decoding never fails: every position is coerced on its own and anything
/// missing or non-numeric becomes `0.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawBar {
    pub ts: Timestamp,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl RawBar {
    pub fn new(ts: Timestamp, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            ts,
            open,
            high,
            low,
            close,
        }
    }

    /// Positional decode of a wire bar.
    pub fn from_value(value: &Value) -> Self {
        let field = |idx: usize| value.get(idx).and_then(Value::as_f64).unwrap_or(0.0);
        Self {
            ts: field(0) as Timestamp,
            open: field(1),
            high: field(2),
            low: field(3),
            close: field(4),
        }
    }
}

impl<'de> Deserialize<'de> for RawBar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(RawBar::from_value(&value))
    }
}

/// Quote API response body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuoteSet {
    #[serde(
        rename = "_default_chart_interval",
        default,
        deserialize_with = "lenient_string"
    )]
    pub default_interval: String,
    #[serde(rename = "_ref_price", default, deserialize_with = "lenient_f64")]
    pub reference_price: f64,
    #[serde(rename = "_d")]
    pub bars: Vec<RawBar>,
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        _ => String::new(),
    })
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_f64().unwrap_or(0.0))
}

/// Prices of one candle as the chart renderer consumes them.
///
/// Serialized as `[open, close, low, high]`: open/close sit at positions 0/1
/// so the renderer colours a candle rising when `close >= open`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Ohlc {
    pub open: f64,
    pub close: f64,
    pub low: f64,
    pub high: f64,
}

impl Ohlc {
    pub fn as_array(&self) -> [f64; 4] {
        [self.open, self.close, self.low, self.high]
    }
}

impl Serialize for Ohlc {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_array().serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candle {
    pub ts: Timestamp,
    /// Label formatted with [`TIME_LABEL_FORMAT`] in the display zone.
    pub time: String,
    pub ohlc: Ohlc,
}

impl Candle {
    pub fn from_raw(bar: &RawBar, zone: Tz) -> Self {
        Self {
            ts: bar.ts,
            time: format_bar_time(bar.ts, zone),
            ohlc: Ohlc {
                open: bar.open,
                close: bar.close,
                low: bar.low,
                high: bar.high,
            },
        }
    }

    pub fn open(&self) -> f64 {
        self.ohlc.open
    }

    pub fn high(&self) -> f64 {
        self.ohlc.high
    }

    pub fn low(&self) -> f64 {
        self.ohlc.low
    }

    pub fn close(&self) -> f64 {
        self.ohlc.close
    }

    /// `(high + low + close) / 3`.
    pub fn typical_price(&self) -> f64 {
        (self.high() + self.low() + self.close()) / 3.0
    }
}

/// Convert wire bars into display candles, keeping at most [`BAR_WINDOW`]
/// bars (the first ones, by index).
pub fn normalize(raw_bars: &[RawBar], zone: Tz) -> Vec<Candle> {
    raw_bars
        .iter()
        .take(BAR_WINDOW)
        .map(|bar| Candle::from_raw(bar, zone))
        .collect()
}

/// Format a ms timestamp in `zone`. Out-of-range timestamps render as the epoch.
pub fn format_bar_time(ts: Timestamp, zone: Tz) -> String {
    let utc = DateTime::<Utc>::from_timestamp_millis(ts).unwrap_or_default();
    utc.with_timezone(&zone).format(TIME_LABEL_FORMAT).to_string()
}

/// Parse an IANA zone name; `None` when the name is unknown.
pub fn parse_zone(name: &str) -> Option<Tz> {
    let name = name.trim();
    if name.is_empty() {
        return Some(Tz::UTC);
    }
    name.parse::<Tz>().ok()
}

/// Like [`parse_zone`] but falls back to UTC.
pub fn resolve_zone(name: &str) -> Tz {
    parse_zone(name).unwrap_or(Tz::UTC)
}
