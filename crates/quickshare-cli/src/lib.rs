use anyhow::Context;
use quickshare_core::{AppError, ErrorMetadata, LogLevel};
use serde::Serialize;

/// Initialize tracing for the CLI.
///
/// `RUST_LOG` overrides the default filter; `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("quickshare=info"));

    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

pub fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

/// Client-facing rendering of a coordinator error
pub fn error_payload(err: &AppError) -> serde_json::Value {
    serde_json::json!({
        "error": err.error_code(),
        "message": err.client_message(),
        "recoverable": err.is_recoverable(),
        "suggested_action": err.suggested_action(),
    })
}

/// Log a failed command at the level its error calls for
pub fn log_failure(err: &AppError) {
    let details = err.detailed_message();
    match err.log_level() {
        LogLevel::Debug => tracing::debug!(error = %details, code = err.error_code(), "Command failed"),
        LogLevel::Warn => tracing::warn!(error = %details, code = err.error_code(), "Command failed"),
        LogLevel::Error => tracing::error!(error = %details, code = err.error_code(), "Command failed"),
    }
}
