use crate::klines::PriceSeries;
use anyhow::{Result, anyhow, bail};
use plotters::prelude::*;
use std::path::{Path, PathBuf};

// Dark theme.
const BACKGROUND: RGBColor = RGBColor(17, 17, 17);
const GRID: RGBColor = RGBColor(40, 52, 66);
const TEXT: RGBColor = RGBColor(242, 245, 250);
const CLOSE_LINE: RGBColor = RGBColor(99, 110, 250);
const MA_LINE: RGBColor = RGBColor(239, 85, 59);

/// Produces a chart artifact for one ticker and returns where it was written.
pub trait ChartRenderer {
    fn render(&self, series: &PriceSeries, moving_average: &[Option<f64>]) -> Result<PathBuf>;
}

/// `{dir}/{TICKER}_price.png`. Same ticker, same file.
pub fn artifact_path(dir: &Path, ticker: &str) -> PathBuf {
    dir.join(format!("{}_price.png", ticker))
}

fn draw_err<E: std::fmt::Display>(e: E) -> anyhow::Error {
    anyhow!("Chart drawing failed: {}", e)
}

fn value_bounds(series: &PriceSeries, moving_average: &[Option<f64>]) -> (f64, f64) {
    let (min, max) = series
        .candles
        .iter()
        .map(|c| c.close)
        .chain(moving_average.iter().flatten().copied())
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));

    let span = max - min;
    let pad = if span > 0.0 { span * 0.02 } else { (max.abs() * 0.01).max(1.0) };
    (min - pad, max + pad)
}

pub struct PngChartRenderer {
    pub out_dir: PathBuf,
    pub ma_window: usize,
    pub width: u32,
    pub height: u32,
}

impl PngChartRenderer {
    pub fn new<P: AsRef<Path>>(out_dir: P, ma_window: usize) -> Self {
        Self {
            out_dir: out_dir.as_ref().to_path_buf(),
            ma_window,
            width: 1280,
            height: 720,
        }
    }

    fn draw(&self, path: &Path, series: &PriceSeries, moving_average: &[Option<f64>]) -> Result<()> {
        let candles = &series.candles;
        let x_max = (candles.len().max(2) - 1) as f64;
        let (y_min, y_max) = value_bounds(series, moving_average);

        let root = BitMapBackend::new(path, (self.width, self.height)).into_drawing_area();
        root.fill(&BACKGROUND).map_err(draw_err)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(format!("{} Price Movement", series.ticker), ("sans-serif", 28, &TEXT))
            .margin(20)
            .x_label_area_size(60)
            .y_label_area_size(80)
            .build_cartesian_2d(0f64..x_max, y_min..y_max)
            .map_err(draw_err)?;

        // The x axis is the sample index, labelled with the sample's time,
        // so nights and weekends do not open gaps in the line.
        let time_label = |x: &f64| {
            let index = x.round().max(0.0) as usize;
            candles
                .get(index)
                .map(|c| c.timestamp.format("%d-%m %H:%M").to_string())
                .unwrap_or_default()
        };
        let price_label = |y: &f64| format!("{:.2}", y);

        chart
            .configure_mesh()
            .bold_line_style(GRID)
            .light_line_style(GRID.mix(0.3))
            .axis_style(GRID)
            .x_labels(8)
            .y_labels(10)
            .x_label_formatter(&time_label)
            .y_label_formatter(&price_label)
            .x_desc("Datetime")
            .y_desc("Price")
            .label_style(("sans-serif", 14, &TEXT))
            .axis_desc_style(("sans-serif", 16, &TEXT))
            .draw()
            .map_err(draw_err)?;

        chart
            .draw_series(LineSeries::new(
                candles.iter().enumerate().map(|(i, c)| (i as f64, c.close)),
                CLOSE_LINE.stroke_width(1),
            ))
            .map_err(draw_err)?
            .label("Close Price")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], CLOSE_LINE.stroke_width(2)));

        chart
            .draw_series(LineSeries::new(
                moving_average
                    .iter()
                    .enumerate()
                    .filter_map(|(i, v)| v.map(|v| (i as f64, v))),
                MA_LINE.stroke_width(2),
            ))
            .map_err(draw_err)?
            .label(format!("MA{}", self.ma_window))
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], MA_LINE.stroke_width(2)));

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(BACKGROUND.mix(0.8))
            .border_style(GRID)
            .label_font(("sans-serif", 14, &TEXT))
            .draw()
            .map_err(draw_err)?;

        root.present().map_err(draw_err)?;
        Ok(())
    }
}

impl ChartRenderer for PngChartRenderer {
    fn render(&self, series: &PriceSeries, moving_average: &[Option<f64>]) -> Result<PathBuf> {
        if series.is_empty() {
            bail!("Cannot chart {}: series is empty", series.ticker);
        }

        let path = artifact_path(&self.out_dir, &series.ticker);
        self.draw(&path, series, moving_average)?;

        log::debug!("{}: chart written to {:?}", series.ticker, path);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::moving_average_trace;
    use crate::klines::Candle;
    use chrono::{Duration, TimeZone, Utc};

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G'];

    fn series_from(ticker: &str, closes: &[f64]) -> PriceSeries {
        let start = Utc.with_ymd_and_hms(2024, 5, 6, 13, 30, 0).unwrap();
        PriceSeries {
            ticker: ticker.to_string(),
            candles: closes
                .iter()
                .enumerate()
                .map(|(i, &close)| Candle {
                    timestamp: start + Duration::hours(i as i64),
                    open: close,
                    high: close + 0.5,
                    low: close - 0.5,
                    close,
                    volume: 500.0,
                })
                .collect(),
        }
    }

    #[test]
    fn artifact_path_is_derived_from_ticker() {
        let dir = Path::new("/tmp/charts");
        assert_eq!(artifact_path(dir, "TSLA"), PathBuf::from("/tmp/charts/TSLA_price.png"));
        assert_eq!(artifact_path(dir, "TSLA"), artifact_path(dir, "TSLA"));
        assert_ne!(artifact_path(dir, "TSLA"), artifact_path(dir, "AAPL"));
    }

    #[test]
    fn renders_png_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = PngChartRenderer::new(dir.path(), 20);

        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let series = series_from("NVDA", &closes);
        let ma = moving_average_trace(&closes, 20);

        let path = renderer.render(&series, &ma).unwrap();

        assert_eq!(path, dir.path().join("NVDA_price.png"));
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(PNG_MAGIC));
    }

    #[test]
    fn rerender_overwrites_instead_of_accumulating() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = PngChartRenderer::new(dir.path(), 5);

        let first: Vec<f64> = (0..30).map(|i| 50.0 + i as f64).collect();
        let second: Vec<f64> = (0..30).map(|i| 80.0 - i as f64).collect();

        let p1 = renderer
            .render(&series_from("MSFT", &first), &moving_average_trace(&first, 5))
            .unwrap();
        let p2 = renderer
            .render(&series_from("MSFT", &second), &moving_average_trace(&second, 5))
            .unwrap();

        assert_eq!(p1, p2);
        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn flat_series_still_renders() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = PngChartRenderer::new(dir.path(), 3);
        let closes = [42.0; 10];

        let path = renderer
            .render(&series_from("CELH", &closes), &moving_average_trace(&closes, 3))
            .unwrap();
        assert!(path.exists());
    }

    #[test]
    fn empty_series_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = PngChartRenderer::new(dir.path(), 150);

        assert!(renderer.render(&PriceSeries::empty("AAPL"), &[]).is_err());
        assert!(!artifact_path(dir.path(), "AAPL").exists());
    }

    #[test]
    fn missing_output_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = PngChartRenderer::new(dir.path().join("does/not/exist"), 3);
        let closes = [1.0, 2.0, 3.0, 4.0];

        let result = renderer.render(&series_from("TSLA", &closes), &moving_average_trace(&closes, 3));
        assert!(result.is_err());
    }

    #[test]
    fn bounds_cover_price_and_average() {
        let series = series_from("TSLA", &[10.0, 20.0]);
        let (lo, hi) = value_bounds(&series, &[None, Some(5.0)]);
        assert!(lo < 5.0);
        assert!(hi > 20.0);
    }
}
