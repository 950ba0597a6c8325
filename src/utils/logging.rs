/// Initialize tracing/logging for the application.
///
/// Unrecognized level strings fall back to `INFO`. Uses `try_init` so tests
/// and embedding applications can call this more than once without panicking.
pub fn init(default_level: &str) {
    let lvl = default_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);

    let _ = tracing_subscriber::fmt()
        .with_max_level(lvl)
        .with_target(false)
        .try_init();
}
