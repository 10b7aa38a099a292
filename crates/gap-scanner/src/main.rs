use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use gap_pipeline::EnrichmentPipeline;
use gap_risk_calculator::GapRiskCalculator;
use seeking_alpha_client::SeekingAlphaClient;

mod config;
mod loader;
mod sink;

use config::ScannerConfig;

const EXIT_CONFIG: u8 = 1;
const EXIT_LOAD: u8 = 2;
const EXIT_WRITE: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    // 1. Load .env, init tracing
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    // 2. Configuration
    let config = match ScannerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {:#}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    let params = match config.risk_parameters() {
        Ok(params) => params,
        Err(e) => {
            tracing::error!("Invalid risk parameters: {:#}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    tracing::info!("Starting opening gap scan");
    tracing::info!("  Input: {}", config.input_path.display());
    tracing::info!("  Output: {}", config.output_path.display());
    tracing::info!("  Account balance: ${:.2}", config.account_balance);
    tracing::info!(
        "  Max loss per trade: ${} ({:.1}%)",
        params.max_loss_per_trade(),
        config.loss_tolerance_percent * 100.0
    );
    tracing::info!("  Profit capture: {:.0}%", config.profit_capture_percent * 100.0);
    tracing::info!("  Gap threshold: {:.0}%", config.gap_threshold * 100.0);
    tracing::info!(
        "  News: {} (timeout {}s, concurrency {})",
        config.news_api_base_url,
        config.news_timeout_seconds,
        config.news_concurrency
    );

    // 3. News client
    let news = match SeekingAlphaClient::with_options(
        &config.news_api_key,
        &config.news_api_base_url,
        config.news_page_size,
        Duration::from_secs(config.news_timeout_seconds),
    ) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!("Cannot build news client: {:#}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    // 4. Load candidates
    let loaded = match loader::load_candidates(&config.input_path) {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::from(EXIT_LOAD);
        }
    };
    if loaded.dropped_rows > 0 {
        tracing::warn!("{} malformed input rows dropped", loaded.dropped_rows);
    }

    // 5. Plan and enrich
    let pipeline = EnrichmentPipeline::new(GapRiskCalculator::new(params), news)
        .with_gap_threshold(config.gap_threshold)
        .with_concurrency(config.news_concurrency);
    let outcome = pipeline.run(loaded.candidates).await;
    tracing::info!(
        "Pipeline finished: {} received, {} below threshold, {} emitted, {} skipped",
        outcome.report.received,
        outcome.report.filtered_out,
        outcome.report.emitted,
        outcome.report.skipped
    );

    // 6. Deliver
    if let Err(e) = sink::write_selections(&config.output_path, &outcome.selections) {
        tracing::error!("Error writing output: {}", e);
        return ExitCode::from(EXIT_WRITE);
    }

    tracing::info!("Finished writing output {}", config.output_path.display());
    ExitCode::SUCCESS
}
