use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Directory bootstrap ────────────────────────────────────────────────────────

/// Ensure `~/.pnl-report/` and its `inbox/` exist.
pub fn ensure_directories() -> anyhow::Result<()> {
    ensure_directories_in(&home_dir())
}

/// Create `.pnl-report/` and `.pnl-report/inbox/` under `base_dir`.
pub fn ensure_directories_in(base_dir: &Path) -> anyhow::Result<()> {
    let app_dir = base_dir.join(".pnl-report");
    std::fs::create_dir_all(&app_dir)?;
    std::fs::create_dir_all(app_dir.join("inbox"))?;
    Ok(())
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map a CLI log level (`DEBUG`, `INFO`, `WARNING`, `ERROR`, `CRITICAL`) to
/// an [`EnvFilter`] directive.
fn filter_directive(log_level: &str) -> String {
    let upper = log_level.to_uppercase();
    match upper.as_str() {
        "DEBUG" => "debug".to_string(),
        "INFO" => "info".to_string(),
        "WARNING" => "warn".to_string(),
        "ERROR" | "CRITICAL" => "error".to_string(),
        _ => log_level.to_lowercase(),
    }
}

/// Initialise the global `tracing` subscriber.
///
/// Output goes to stderr so that a JSON report on stdout stays parseable.
/// Falls back to `"info"` if the level string is not recognised.
pub fn setup_logging(log_level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(filter_directive(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(subscriber)
        .try_init()?;

    Ok(())
}

// ── Inbox discovery ────────────────────────────────────────────────────────────

/// The default export inbox, `~/.pnl-report/inbox/`, when it exists.
pub fn discover_inbox() -> Option<PathBuf> {
    discover_inbox_in(&home_dir())
}

pub fn discover_inbox_in(base_dir: &Path) -> Option<PathBuf> {
    let inbox = base_dir.join(".pnl-report").join("inbox");
    inbox.is_dir().then_some(inbox)
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

// ── Tests ──────────────────────────────────────────────────────────────────────
