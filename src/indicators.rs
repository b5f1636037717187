use crate::klines::PriceSeries;
use std::fmt;
use ta::Next;
use ta::indicators::SimpleMovingAverage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    Hold,
    ConsiderSelling,
}

impl Recommendation {
    pub fn label(&self) -> &'static str {
        match self {
            Recommendation::Hold => "hold/strengthen",
            Recommendation::ConsiderSelling => "consider selling",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Recommendation::Hold => "📈",
            Recommendation::ConsiderSelling => "📉",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signal {
    pub latest_price: f64,
    pub moving_average: f64,
    pub recommendation: Recommendation,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Trailing simple moving average aligned to every sample.
/// Positions before the window fills are `None`.
pub fn moving_average_trace(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    let Ok(mut sma) = SimpleMovingAverage::new(window) else {
        return vec![None; closes.len()];
    };

    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let value = sma.next(close);
            (i + 1 >= window).then_some(value)
        })
        .collect()
}

/// Latest close vs. its `window`-sample average.
/// Returns `None` when the series is shorter than the window.
pub fn compute_signal(series: &PriceSeries, window: usize) -> Option<Signal> {
    if window == 0 || series.len() < window {
        return None;
    }

    let closes = series.closes();
    let last_ma = moving_average_trace(&closes, window).last().copied().flatten()?;
    let last_close = *closes.last()?;

    let latest_price = round2(last_close);
    let moving_average = round2(last_ma);
    let recommendation = if latest_price > moving_average {
        Recommendation::Hold
    } else {
        Recommendation::ConsiderSelling
    };

    Some(Signal {
        latest_price,
        moving_average,
        recommendation,
    })
}
