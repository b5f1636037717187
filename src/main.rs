mod chart;
mod config;
mod indicators;
mod klines;
mod monitor;
mod telegram;
#[cfg(test)]
mod test_http;

use anyhow::Context;
use chart::PngChartRenderer;
use config::AppConfig;
use klines::YahooSource;
use monitor::Monitor;
use telegram::TelegramNotifier;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    // Step 1: Configuration
    let app_config = AppConfig::load().context("Failed to load configuration")?;
    log::info!(
        "Watching {} every {}s (MA{} over {}d of {} bars)",
        app_config.monitor.tickers.join(", "),
        app_config.monitor.cycle_delay.as_secs(),
        app_config.monitor.ma_window,
        app_config.monitor.lookback_days,
        app_config.monitor.interval
    );

    // Step 2: Collaborators
    let source = YahooSource::new()?;
    let renderer = PngChartRenderer::new(&app_config.monitor.chart_dir, app_config.monitor.ma_window);
    let notifier = TelegramNotifier::new(&app_config.telegram)?;

    // Step 3: Stop cleanly on Ctrl-C
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Ctrl-C received, stopping");
            on_signal.cancel();
        }
    });

    // Step 4: Run until killed; any failure ends the process
    let monitor = Monitor::new(&app_config.monitor, source, renderer, notifier);
    if let Err(e) = monitor.run(cancel).await {
        log::error!("Monitor failed: {:#}", e);
        return Err(e);
    }

    Ok(())
}
