use tracing_subscriber::EnvFilter;

const LOG_FILTER_ENV: &str = "LEDGER_LOG";

/// Install the process-wide subscriber. Logs go to stderr so command reports
/// on stdout stay machine readable.
pub fn init() {
    let filter =
        EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
