//! Logging bootstrap for the client binary.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// Builds the subscriber filter from `log.level`.
///
/// Accepts a bare level (`debug`) or `EnvFilter` directives such as
/// `telemq=debug,rustls=warn`. Input that does not parse logs at `INFO`.
pub fn filter(directives: &str) -> EnvFilter {
    let builder = || EnvFilter::builder().with_default_directive(LevelFilter::INFO.into());
    match builder().parse(directives.trim()) {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("invalid log directive `{directives}` ({e}); logging at info");
            builder().parse_lossy("")
        }
    }
}

/// Installs the global `fmt` subscriber. Later calls are no-ops.
pub fn init(directives: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(directives))
        .with_target(true)
        .try_init();
}
