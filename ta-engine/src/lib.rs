use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use ts_core::Candle;

/// Fast and slow windows drawn on every chart.
pub const SMA_FAST: usize = 10;
pub const SMA_SLOW: usize = 20;

/// Which candle field to use as input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceField {
    Open,
    High,
    Low,
    Close,
    /// Typical price, `(high + low + close) / 3`.
    Hlc3,
}

impl SourceField {
    pub fn value(&self, c: &Candle) -> f64 {
        match self {
            SourceField::Open => c.open(),
            SourceField::High => c.high(),
            SourceField::Low => c.low(),
            SourceField::Close => c.close(),
            SourceField::Hlc3 => c.typical_price(),
        }
    }
}

/// Supported indicator kinds. Every kind yields one line, index-aligned with
/// the candles it was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorKind {
    Sma,
}

/// Config for an indicator instance (but no runtime state).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorConfig {
    /// Series name shown in the chart legend.
    pub label: String,
    pub kind: IndicatorKind,
    pub period: usize,
    pub source: SourceField,
}

impl IndicatorConfig {
    pub fn sma(label: impl Into<String>, period: usize, source: SourceField) -> Self {
        Self {
            label: label.into(),
            kind: IndicatorKind::Sma,
            period,
            source,
        }
    }
}

/// Indicator computation engine – stateful, incremental.
pub trait IndicatorEngine {
    fn kind(&self) -> IndicatorKind;
    fn reset(&mut self);

    /// Feed one sample; `None` until enough history is accumulated.
    fn next(&mut self, value: f64) -> Option<f64>;

    /// Run over a whole series. The output has one slot per input sample.
    fn apply_history(&mut self, values: &[f64]) -> Vec<Option<f64>> {
        self.reset();
        values.iter().map(|v| self.next(*v)).collect()
    }
}

struct SmaEngine {
    period: usize,
    window: VecDeque<f64>,
    sum: f64,
}

impl SmaEngine {
    fn new(period: usize) -> Self {
        Self {
            period,
            window: VecDeque::with_capacity(period + 1),
            sum: 0.0,
        }
    }
}

impl IndicatorEngine for SmaEngine {
    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Sma
    }

    fn reset(&mut self) {
        self.window.clear();
        self.sum = 0.0;
    }

    fn next(&mut self, value: f64) -> Option<f64> {
        if self.period == 0 {
            return None;
        }
        self.window.push_back(value);
        self.sum += value;
        if self.window.len() > self.period {
            if let Some(old) = self.window.pop_front() {
                self.sum -= old;
            }
        }
        if self.window.len() == self.period {
            Some(self.sum / self.period as f64)
        } else {
            None
        }
    }
}

fn create_engine(config: &IndicatorConfig) -> Box<dyn IndicatorEngine> {
    match config.kind {
        IndicatorKind::Sma => Box::new(SmaEngine::new(config.period)),
    }
}

/// Typical price per candle.
pub fn typical_prices(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(Candle::typical_price).collect()
}

/// Trailing simple moving average. Slot `i` holds the mean of
/// `series[i + 1 - window..=i]`, or `None` while fewer than `window` samples
/// have been seen.
pub fn simple_moving_average(series: &[f64], window: usize) -> Vec<Option<f64>> {
    SmaEngine::new(window).apply_history(series)
}

/// One computed line, aligned slot-for-slot with the candles.
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorSeries {
    pub config: IndicatorConfig,
    pub values: Vec<Option<f64>>,
}

impl IndicatorSeries {
    pub fn label(&self) -> &str {
        &self.config.label
    }

    /// Index of the first defined value.
    pub fn first_defined(&self) -> Option<usize> {
        self.values.iter().position(Option::is_some)
    }
}

/// All indicator lines for one chart.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndicatorSet {
    len: usize,
    series: Vec<IndicatorSeries>,
}

impl IndicatorSet {
    pub fn compute(candles: &[Candle], configs: &[IndicatorConfig]) -> Self {
        let series = configs
            .iter()
            .map(|config| {
                let input = match config.source {
                    SourceField::Hlc3 => typical_prices(candles),
                    source => candles.iter().map(|c| source.value(c)).collect(),
                };
                let mut engine = create_engine(config);
                IndicatorSeries {
                    config: config.clone(),
                    values: engine.apply_history(&input),
                }
            })
            .collect();
        Self {
            len: candles.len(),
            series,
        }
    }

    /// MA0/MA1: 10 and 20 period SMAs of the typical price.
    pub fn default_configs() -> Vec<IndicatorConfig> {
        vec![
            IndicatorConfig::sma("MA0", SMA_FAST, SourceField::Hlc3),
            IndicatorConfig::sma("MA1", SMA_SLOW, SourceField::Hlc3),
        ]
    }

    pub fn default_pair(candles: &[Candle]) -> Self {
        Self::compute(candles, &Self::default_configs())
    }

    /// Number of slots in every series (== number of candles).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn series(&self) -> &[IndicatorSeries] {
        &self.series
    }

    pub fn get(&self, label: &str) -> Option<&IndicatorSeries> {
        self.series.iter().find(|s| s.label() == label)
    }
}
