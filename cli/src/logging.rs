use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "APICALL_LOG";
const DEFAULT_FILTER: &str = "warn";

/// Send `tracing` events to stderr, filtered by `APICALL_LOG`.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
