//! The monitoring loop: fetch, compute, render, notify, sleep, repeat.

use crate::chart::ChartRenderer;
use crate::config::MonitorConfig;
use crate::indicators::{self, Signal};
use crate::klines::PriceSource;
use crate::telegram::Notifier;
use anyhow::Result;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// What happened to a single ticker during a cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum TickerOutcome {
    NoData,
    InsufficientHistory { samples: usize },
    Reported(Signal),
}

pub fn no_data_message(ticker: &str) -> String {
    format!("❌ No data available for {}", ticker)
}

pub fn insufficient_history_message(ticker: &str, samples: usize, window: usize) -> String {
    format!("⚠️ Not enough data for {}: {} of {} samples", ticker, samples, window)
}

pub fn caption(ticker: &str, signal: &Signal, window: usize) -> String {
    let side = if signal.latest_price > signal.moving_average { "above" } else { "below" };
    format!(
        "📊 Ticker: {}\n💰 Current price: {:.2}$\n📉 MA{}: {:.2}$\n📈 Action: {} {} ({} MA{})",
        ticker,
        signal.latest_price,
        window,
        signal.moving_average,
        signal.recommendation.emoji(),
        signal.recommendation.label(),
        side,
        window
    )
}

/// Sleeps for `delay` unless cancelled first. Returns `false` on cancellation.
async fn pause(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

pub struct Monitor<'a, S, R, N> {
    config: &'a MonitorConfig,
    source: S,
    renderer: R,
    notifier: N,
}

impl<'a, S, R, N> Monitor<'a, S, R, N>
where
    S: PriceSource,
    R: ChartRenderer,
    N: Notifier,
{
    pub fn new(config: &'a MonitorConfig, source: S, renderer: R, notifier: N) -> Self {
        Self {
            config,
            source,
            renderer,
            notifier,
        }
    }

    /// Runs the full pipeline for one ticker.
    /// Only "no data" and "too little data" are handled here; every other failure propagates.
    pub async fn process_ticker(&self, ticker: &str) -> Result<TickerOutcome> {
        let window = self.config.ma_window;

        let series = self
            .source
            .fetch(ticker, self.config.lookback_days, &self.config.interval)
            .await?;

        if series.is_empty() {
            log::info!("{}: no data", ticker);
            self.notifier.send_text(&no_data_message(ticker)).await?;
            return Ok(TickerOutcome::NoData);
        }

        let Some(signal) = indicators::compute_signal(&series, window) else {
            log::info!("{}: only {} samples, need {}", ticker, series.len(), window);
            self.notifier
                .send_text(&insufficient_history_message(ticker, series.len(), window))
                .await?;
            return Ok(TickerOutcome::InsufficientHistory { samples: series.len() });
        };

        let trace = indicators::moving_average_trace(&series.closes(), window);
        let chart_path = self.renderer.render(&series, &trace)?;

        self.notifier
            .send_image(&chart_path, &caption(ticker, &signal, window))
            .await?;

        log::info!(
            "{}: price {:.2}, MA{} {:.2} -> {}",
            ticker,
            signal.latest_price,
            window,
            signal.moving_average,
            signal.recommendation
        );
        Ok(TickerOutcome::Reported(signal))
    }

    /// One pass over the ticker list, in configured order, with the short
    /// courtesy delay after each ticker. Returns `false` if cancelled part way.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<bool> {
        for ticker in &self.config.tickers {
            if cancel.is_cancelled() {
                return Ok(false);
            }
            self.process_ticker(ticker).await?;
            if !pause(self.config.ticker_delay, cancel).await {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Cycles forever until `cancel` fires or a ticker fails.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let mut cycle: u64 = 0;
        loop {
            cycle += 1;
            log::info!("Cycle {} over {} tickers", cycle, self.config.tickers.len());

            if !self.run_cycle(&cancel).await? {
                break;
            }

            println!(
                "Waiting {}s for the next run...",
                self.config.cycle_delay.as_secs()
            );
            if !pause(self.config.cycle_delay, &cancel).await {
                break;
            }
        }
        log::info!("Monitor stopped after {} cycle(s)", cycle);
        Ok(())
    }
}
