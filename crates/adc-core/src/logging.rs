//! Shared logging initialization for adc binaries.

use std::sync::OnceLock;

static INIT: OnceLock<()> = OnceLock::new();

fn level_from(value: Option<&str>) -> tracing::Level {
    match value.unwrap_or("info").to_ascii_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

/// Initialize process-level tracing output from `ADC_LOG`.
///
/// Safe to call more than once; only the first call installs the subscriber.
/// Output goes to stderr so CLI stdout stays machine-readable.
pub fn init() {
    init_with_level(None);
}

/// Like [`init`], but `level` (when set) wins over `ADC_LOG`.
pub fn init_with_level(level: Option<tracing::Level>) {
    if INIT.get().is_some() {
        return;
    }
    let env = std::env::var("ADC_LOG").ok();
    let level = level.unwrap_or_else(|| level_from(env.as_deref()));
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
    let _ = INIT.set(());
}
