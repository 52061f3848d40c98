use tracing_subscriber::EnvFilter;

/// Install the global `fmt` subscriber.
///
/// `level` comes from config; `RUST_LOG` still wins when set.
pub fn init_logging(level: &str) {
    let default = format!("{level},sqlx=warn,reqwest=warn,hyper=warn");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .init();
}
