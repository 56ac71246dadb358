// src/main.rs

use clap::Parser;
use log::LevelFilter;
use log4rs::{
    append::console::ConsoleAppender,
    append::file::FileAppender,
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
    Config,
};
use std::fs;
use std::process::ExitCode;
use std::sync::Arc;
use tapeharvest::dispatch::load_proxies;
use tapeharvest::session::{exchange_now, load_symbols};
use tapeharvest::source::SourceConfig;
use tapeharvest::{
    check_session, AppError, ChartClient, CommandLineInput, Dispatcher, HarvestConfig,
    HarvestPlan, HarvestSummary, Harvester, HttpPageSource, SymbolStatus, TimeSalesDecoder,
};

/// Exit code for a run that finished but left some symbols incomplete.
const EXIT_DEGRADED: u8 = 2;

/// Sets up logging configuration.
fn setup_logging(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let log_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let log_file_path = std::env::temp_dir().join("tapeharvest.log");
    if let Some(parent) = log_file_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let pattern = if verbose {
        "{d(%Y-%m-%d %H:%M:%S)} [{l}] {T} - {m}{n}"
    } else {
        "{d(%H:%M:%S)} {l} - {m}{n}"
    };

    let stdout_appender = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(pattern)))
        .build();

    let file_appender = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S)} [{l}] {T} - {m}{n}",
        )))
        .build(&log_file_path)?;

    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout_appender)))
        .appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(LevelFilter::Debug)))
                .build("file", Box::new(file_appender)),
        )
        .build(
            Root::builder()
                .appender("stdout")
                .appender("file")
                .build(log_level),
        )?;

    log4rs::init_config(config)?;
    log::info!("Logging initialized. Log file: {}", log_file_path.display());
    Ok(())
}

/// Runs the harvest. `None` means the session check declined to run.
async fn execute_harvest(config: &HarvestConfig) -> Result<Option<HarvestSummary>, AppError> {
    let quotes = Arc::new(ChartClient::new(config.request_timeout)?);
    let now = exchange_now();

    let date = if config.skip_session_check {
        log::warn!("Session check skipped; harvesting {}", now.date());
        now.date()
    } else {
        let status = check_session(now, quotes.as_ref(), config.quote_retry).await?;
        if !status.is_ready() {
            log::error!("Not harvesting: {}", status);
            return Ok(None);
        }
        log::info!("{}", status);
        now.date()
    };

    let proxies = load_proxies(&config.proxy_file)?;
    if proxies.is_empty() {
        log::warn!(
            "No usable proxies in {}; every page will be abandoned",
            config.proxy_file.display()
        );
    }
    let symbols = load_symbols(&config.symbol_file)?;

    let mut source_config = SourceConfig::new(date);
    source_config.request_timeout = config.request_timeout;
    source_config.page_delay = config.page_delay;
    let pages = HttpPageSource::new(source_config, Arc::new(TimeSalesDecoder));

    let harvester = Harvester::new(
        quotes,
        Dispatcher::new(Arc::new(pages), config.dispatch_config()),
    );
    let plan = HarvestPlan {
        date,
        symbols,
        proxies,
        worker_count: config.worker_count,
        time_slices: config.time_slices,
        data_dir: config.data_dir.clone(),
        quote_retry: config.quote_retry,
    };

    harvester.harvest(&plan).await.map(Some)
}

/// Prints the per-symbol outcome table.
fn report_completion(summary: &HarvestSummary) {
    for report in &summary.symbols {
        let status = match &report.status {
            SymbolStatus::Complete => "ok".to_string(),
            SymbolStatus::Degraded { abandoned } => format!("partial ({} pages lost)", abandoned),
            SymbolStatus::NoQuotes => "no quotes".to_string(),
            SymbolStatus::QuotesFailed { reason } => format!("quotes failed: {}", reason),
        };
        println!(
            "{:<8} {:>4} minutes {:>6} trades {:>5} pages  {}",
            report.symbol.as_str(),
            report.minutes_written,
            report.trades_kept,
            report.pages_fetched,
            status
        );
    }

    println!(
        "Wrote {} of {} symbols for {} in {:.1?}",
        summary.files_written(),
        summary.symbols.len(),
        summary.date,
        summary.elapsed
    );

    let degraded = summary.degraded_symbols();
    if !degraded.is_empty() {
        let names: Vec<&str> = degraded.iter().map(|s| s.as_str()).collect();
        eprintln!("Incomplete: {}", names.join(", "));
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = CommandLineInput::parse();

    setup_logging(cli.verbose)?;

    let config = HarvestConfig::resolve(cli)?;

    let Some(summary) = execute_harvest(&config).await? else {
        return Ok(ExitCode::SUCCESS);
    };

    report_completion(&summary);

    if summary.is_degraded() {
        Ok(ExitCode::from(EXIT_DEGRADED))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
