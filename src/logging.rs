use crate::config::Config;
use crate::core::types::ValidationResult;
use crate::loading::session::LoadOutcome;
use log::{debug, error, info, warn};

/// Initialize the logger with appropriate level based on verbosity
pub fn init_logger(verbose: bool, quiet: bool) {
    let level = if quiet {
        log::LevelFilter::Off
    } else if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn // Refused URLs and failed loads stay visible
    };

    // Already initialized, e.g. by an embedding application
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .try_init();

    debug!("Logger initialized with level: {level:?}");
}

/// Log configuration information
pub fn log_config_info(config: &Config) {
    info!(
        "Configuration: timeout={}ms, recenter={}, base={}",
        config.timeout_duration().as_millis(),
        config.recenter(),
        config.base_url.as_deref().unwrap_or("none")
    );
    info!(
        "Reporting: backend={}",
        config.backend_endpoint.as_deref().unwrap_or("disabled")
    );
}

/// Log an admission verdict
pub fn log_admission(raw: &str, verdict: &ValidationResult) {
    match (&verdict.normalized_url, verdict.error) {
        (Some(url), None) => debug!("✓ {raw} -> {url}"),
        (_, Some(err)) => warn!("✗ {raw} -> {err:?} ({err})"),
        (None, None) => debug!("? {raw} -> unknown"),
    }
}

/// Log how a load attempt ended
pub fn log_load_outcome(url: &str, outcome: &LoadOutcome) {
    match outcome {
        LoadOutcome::Rendered(layer) => match layer.extent {
            Some(extent) => info!("✅ Rendered {} from {url}, extent {extent}", layer.kind),
            None => info!("✅ Rendered {} from {url}", layer.kind),
        },
        LoadOutcome::Rejected(err) => warn!("❌ {url} rejected: {err}"),
        LoadOutcome::Failed(err) => warn!("❌ {url}: {err}"),
        LoadOutcome::TimedOut => warn!("⏱ {url}: {outcome}"),
        LoadOutcome::Superseded => debug!("{url}: {outcome}"),
    }
}

/// Log error information
pub fn log_error(message: &str, source: Option<&dyn std::error::Error>) {
    match source {
        Some(err) => error!("{message}: {err}"),
        None => error!("{message}"),
    }
}
