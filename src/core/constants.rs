/// Application-wide constants to avoid magic values throughout the codebase.
///
/// Everything the admission gate and the loaders treat as static
/// configuration lives here: limits, port blocklist, default deadlines and
/// the user-facing status texts.
/// Output format constants
pub mod output_formats {
    /// Text output format - one line per URL
    pub const TEXT: &str = "text";
    /// JSON output format - structured output for automation
    pub const JSON: &str = "json";

    /// Default output format
    pub const DEFAULT: &str = TEXT;

    /// All valid output formats
    pub const ALL: [&str; 2] = [TEXT, JSON];
}

/// Admission gate limits
pub mod admission {
    /// Longest URL accepted, in characters
    pub const MAX_URL_LENGTH: usize = 2048;

    /// Ports of common internal services that may never be targeted explicitly
    pub const BLOCKED_PORTS: [u16; 10] = [22, 23, 25, 110, 143, 445, 3306, 5432, 6379, 27017];

    /// Schemes a resource URL may use
    pub const ALLOWED_SCHEMES: [&str; 2] = ["http", "https"];
}

/// Timeout and duration constants
pub mod timeouts {
    /// Default per-attempt load deadline in milliseconds
    pub const DEFAULT_LOAD_TIMEOUT_MS: u64 = 10_000;
    /// Maximum reasonable load deadline in milliseconds (10 minutes)
    pub const MAX_LOAD_TIMEOUT_MS: u64 = 600_000;
    /// Minimum load deadline in milliseconds
    pub const MIN_LOAD_TIMEOUT_MS: u64 = 100;
    /// Tick interval of the console loading spinner
    pub const SPINNER_TICK_MS: u64 = 120;
    /// How long the CLI waits for backend reports before exiting
    pub const REPORT_FLUSH_MS: u64 = 2_000;
}

/// Map view defaults
pub mod view {
    /// Padding in pixels applied on every side when fitting an extent
    pub const FIT_PADDING: u32 = 50;
    /// Duration of the fit animation in milliseconds
    pub const FIT_DURATION_MS: u64 = 500;
}

/// User-facing status messages
pub mod messages {
    pub const LOADING_TILEJSON: &str = "Loading TileJSON...";
    pub const LOADING_STAC: &str = "Loading STAC item...";
    pub const FETCHING: &str = "Fetching metadata...";
    pub const PARSING: &str = "Parsing response...";
    pub const CREATING_LAYER: &str = "Creating layer...";
    pub const TIMED_OUT: &str = "Operation timed out.";
    pub const LOADED_PREFIX: &str = "Loaded: ";
    pub const EMPTY_RESULT: &str =
        "No features found in the response. Use the details view to inspect the raw data.";
}

/// Activity log event names
pub mod events {
    pub const URL_REJECTED: &str = "url_rejected";
    pub const LOAD_ATTEMPT: &str = "load_attempt";
    pub const LOAD_SUCCESS: &str = "load_success";
    pub const RENDERED: &str = "rendered";
    pub const FETCH_ERROR: &str = "fetch_error";
    pub const LAYER_ERROR: &str = "layer_error";
    pub const EMPTY_FEATURES: &str = "empty_features";
    pub const TIMEOUT: &str = "timeout";
}

/// HTTP request constants
pub mod http {
    /// Accept header sent when fetching resource metadata
    pub const ACCEPT_JSON: &str = "application/json, application/geo+json";
    /// Default User-Agent
    pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
}

/// Configuration file lookup
pub mod files {
    /// Name of the configuration file searched for in the working directory
    pub const CONFIG_FILE_NAME: &str = ".tilegate.toml";
    /// How many parent directories are searched for the configuration file
    pub const CONFIG_PARENT_LEVELS: usize = 3;
}
