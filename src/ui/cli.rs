// Command-line interface definitions and parsing for tilegate

use crate::config::CliConfig;
use crate::core::constants::{output_formats, timeouts};
use crate::params::TileJsonParams;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Suppress status output
    #[arg(short = 'q', long, global = true, help_heading = "Output & Verbosity")]
    pub quiet: bool,

    /// Enable verbose logging
    #[arg(short = 'v', long, global = true, help_heading = "Output & Verbosity")]
    pub verbose: bool,

    /// Use specific config file
    #[arg(long, value_name = "FILE", global = true, help_heading = "Configuration")]
    pub config: Option<String>,

    /// Ignore config files
    #[arg(long, global = true, help_heading = "Configuration")]
    pub no_config: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check URLs against the admission rules without fetching them
    Check {
        /// URLs to check
        #[arg(required = true)]
        urls: Vec<String>,

        /// Resolve relative URLs against this base
        #[arg(long, value_name = "URL")]
        base: Option<String>,

        /// Output format
        #[arg(long, value_name = "FORMAT", value_parser = output_formats::ALL)]
        format: Option<String>,
    },

    /// Fetch a TileJSON or STAC resource and report the layer it produces
    Load {
        /// Resource URL
        url: String,

        /// Resolve a relative URL against this base
        #[arg(long, value_name = "URL")]
        base: Option<String>,

        /// Load deadline in milliseconds (default: 10000)
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,

        /// Don't fit the view to the loaded resource
        #[arg(long)]
        no_recenter: bool,

        /// Custom User-Agent header
        #[arg(long, value_name = "AGENT")]
        user_agent: Option<String>,

        #[command(flatten)]
        tilejson: TileJsonArgs,
    },
}

/// Advanced options for TileJSON resources
#[derive(Args, Debug, Default, Clone)]
#[command(next_help_heading = "TileJSON")]
pub struct TileJsonArgs {
    /// Asset names (comma, semicolon or whitespace separated)
    #[arg(long, value_name = "ASSETS")]
    pub assets: Option<String>,

    /// Color formula, e.g. "gamma RGB 2.7"
    #[arg(long, value_name = "FORMULA")]
    pub color_formula: Option<String>,

    /// Tile image format (png, jpeg, webp, ...)
    #[arg(long, value_name = "FORMAT")]
    pub tile_format: Option<String>,

    /// Extra query string appended to the URL
    #[arg(long, value_name = "QUERY")]
    pub extra_params: Option<String>,
}

impl TileJsonArgs {
    fn to_params(&self) -> Option<TileJsonParams> {
        let params = TileJsonParams {
            assets: non_empty(&self.assets),
            color_formula: non_empty(&self.color_formula),
            tile_format: non_empty(&self.tile_format),
            extra_params: non_empty(&self.extra_params),
        };
        (params != TileJsonParams::default()).then_some(params)
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Convert derive-based CLI arguments directly to CliConfig structure
pub fn cli_to_config(cli: &Cli) -> CliConfig {
    let mut cli_config = CliConfig {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config_file: non_empty(&cli.config),
        no_config: cli.no_config,
        ..CliConfig::default()
    };

    match &cli.command {
        Commands::Check { base, format, .. } => {
            cli_config.base_url = non_empty(base);
            cli_config.output_format = format.clone();
        }
        Commands::Load {
            base,
            timeout_ms,
            no_recenter,
            user_agent,
            tilejson,
            ..
        } => {
            cli_config.base_url = non_empty(base);
            if let Some(timeout_ms) = *timeout_ms
                && timeout_ms > timeouts::MAX_LOAD_TIMEOUT_MS / 10
            {
                eprintln!(
                    "Warning: Timeout of {timeout_ms}ms is quite large. Consider using a smaller value for better user experience."
                );
            }
            cli_config.timeout_ms = *timeout_ms;
            cli_config.no_recenter = *no_recenter;
            cli_config.user_agent = non_empty(user_agent);
            cli_config.tilejson = tilejson.to_params();
        }
    }

    cli_config
}
