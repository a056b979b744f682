use tracing_subscriber::{fmt, EnvFilter};

/// Crate events at debug (submissions, confirmations, discarded refreshes),
/// HTTP and RPC client internals kept quiet.
pub const DEFAULT_FILTER: &str = "info,beeatm=debug,hyper=warn,reqwest=warn";

/// Install the global subscriber. `BEEATM_LOG` (or `RUST_LOG`) selects levels,
/// `BEEATM_LOG_JSON=1` switches to JSON lines. Safe to call more than once.
pub fn init_logging() {
    let directives = std::env::var("BEEATM_LOG").or_else(|_| std::env::var("RUST_LOG")).ok();
    let env_filter = filter_from(directives.as_deref());
    let use_json = std::env::var("BEEATM_LOG_JSON")
        .map(|value| value == "1")
        .unwrap_or(false);

    if use_json {
        let _ = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .json()
            .with_writer(std::io::stderr)
            .try_init();
    } else {
        let _ = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    }
}

/// Unparsable directives fall back to [`DEFAULT_FILTER`].
pub fn filter_from(directives: Option<&str>) -> EnvFilter {
    directives.filter(|s| !s.trim().is_empty())
        .and_then(|s| EnvFilter::try_new(s).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}
