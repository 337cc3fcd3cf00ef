use clap::Parser;
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use tilegate::admission::UrlAdmissionGate;
use tilegate::config::{CliConfig, Config};
use tilegate::core::constants::{output_formats, timeouts};
use tilegate::core::types::ValidationResult;
use tilegate::loading::{HttpFetcher, LoadOptions, LoadOutcome, LoadSession};
use tilegate::logging;
use tilegate::sinks::{ActivityLog, BackendReporter, LogActivity};
use tilegate::ui::{Cli, Commands, ConsoleMap, ConsoleStatus, cli_to_config};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match run(&cli).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// Dispatch the subcommand and return the process exit code
pub async fn run(cli: &Cli) -> Result<i32, Box<dyn std::error::Error>> {
    let cli_config = cli_to_config(cli);
    let config = load_and_merge_config(&cli_config)?;

    let verbose = cli_config.verbose || config.verbose.unwrap_or(false);
    logging::init_logger(verbose, cli_config.quiet);
    logging::log_config_info(&config);

    match &cli.command {
        Commands::Check { urls, .. } => Ok(run_check(urls, &config)?),
        Commands::Load { url, .. } => run_load(url, &config, cli_config.quiet).await,
    }
}

pub fn load_and_merge_config(cli_config: &CliConfig) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if cli_config.no_config {
        Config::default()
    } else if let Some(ref config_file) = cli_config.config_file {
        Config::load_from_file(config_file).inspect_err(|e| {
            logging::log_error(
                &format!("Could not load config file '{config_file}'"),
                Some(e),
            );
        })?
    } else {
        Config::load_from_standard_locations()
    };

    // CLI takes precedence; re-validate the merged result
    config.merge_with_cli(cli_config);
    config.validate()?;
    Ok(config)
}

#[derive(Serialize)]
struct CheckReport<'a> {
    url: &'a str,
    #[serde(flatten)]
    result: &'a ValidationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

/// Validate every URL without touching the network
fn run_check(urls: &[String], config: &Config) -> Result<i32, serde_json::Error> {
    let gate = UrlAdmissionGate::new(config.base_context());

    let mut seen = FxHashSet::default();
    let results: Vec<(&str, ValidationResult)> = urls
        .iter()
        .filter(|url| seen.insert(url.as_str()))
        .map(|url| {
            let verdict = gate.validate(url);
            logging::log_admission(url, &verdict);
            (url.as_str(), verdict)
        })
        .collect();

    if config.output_format() == output_formats::JSON {
        let reports: Vec<CheckReport> = results
            .iter()
            .map(|(url, result)| CheckReport {
                url,
                result,
                message: result.error_message(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for (url, result) in &results {
            match (&result.normalized_url, result.error) {
                (Some(normalized), None) => println!("OK {normalized}"),
                (_, Some(err)) => println!("FAIL {url} - {err} ({err:?})"),
                (None, None) => println!("FAIL {url}"),
            }
        }
    }

    let all_valid = results.iter().all(|(_, result)| result.valid);
    Ok(if all_valid { 0 } else { 1 })
}

/// Run one load through a session wired to the terminal
async fn run_load(
    url: &str,
    config: &Config,
    quiet: bool,
) -> Result<i32, Box<dyn std::error::Error>> {
    let fetcher = HttpFetcher::new(config)?;

    let reporter = config.backend_endpoint.as_ref().map(|endpoint| {
        Arc::new(BackendReporter::new(
            Arc::new(LogActivity),
            fetcher.client().clone(),
            endpoint.clone(),
        ))
    });
    let activity: Arc<dyn ActivityLog> = match reporter {
        Some(ref reporter) => reporter.clone(),
        None => Arc::new(LogActivity),
    };

    let session = LoadSession::new(
        UrlAdmissionGate::new(config.base_context()),
        Arc::new(fetcher),
        Arc::new(ConsoleMap::new(!quiet)),
        Arc::new(ConsoleStatus::new(!quiet)),
        activity,
    )
    .with_timeout(config.timeout_duration());

    let options = LoadOptions {
        recenter: config.recenter(),
        tilejson: config.tilejson_params(),
    };

    log::debug!("Loading {url} with a {:?} deadline", session.timeout());
    let outcome = session.load(url, &options).await;

    // Error reports are still in flight; the runtime dies with the process
    if let Some(reporter) = reporter {
        let bound = Duration::from_millis(timeouts::REPORT_FLUSH_MS);
        if tokio::time::timeout(bound, reporter.flush()).await.is_err() {
            log::debug!("Gave up waiting for reports to {}", reporter.endpoint());
        }
    }

    match outcome {
        LoadOutcome::Rendered(layer) => {
            if config.output_format() == output_formats::JSON {
                println!("{}", serde_json::to_string_pretty(&layer)?);
            } else {
                println!("{} {}", layer.kind, layer.source_url);
                if let Some(extent) = layer.extent {
                    println!("extent: {extent}");
                }
                if let (Some(min), Some(max)) = (layer.min_zoom, layer.max_zoom) {
                    println!("zoom: {min}-{max}");
                }
            }
            Ok(0)
        }
        outcome => {
            // The status display already reported it unless quiet
            log::debug!("Load ended without a layer: {outcome}");
            Ok(1)
        }
    }
}
