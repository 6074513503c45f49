//! Process-level tracing setup for `acb` and embedding workers

use std::sync::OnceLock;

/// Environment variable selecting the log level
pub const LOG_ENV: &str = "ACB_LOG";

static INIT: OnceLock<()> = OnceLock::new();

fn parse_level(raw: Option<&str>) -> tracing::Level {
    match raw.unwrap_or("info").trim().to_ascii_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

/// Install a stderr fmt subscriber at the level named by `ACB_LOG`.
///
/// Only the first call has any effect. Never fails: if another subscriber is
/// already installed, that one stays.
pub fn init() {
    if INIT.get().is_some() {
        return;
    }
    let level = parse_level(std::env::var(LOG_ENV).ok().as_deref());
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
    let _ = INIT.set(());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level(None), tracing::Level::INFO);
        assert_eq!(parse_level(Some("DEBUG")), tracing::Level::DEBUG);
        assert_eq!(parse_level(Some(" warning ")), tracing::Level::WARN);
        assert_eq!(parse_level(Some("error")), tracing::Level::ERROR);
        assert_eq!(parse_level(Some("nonsense")), tracing::Level::INFO);
    }

    #[test]
    fn test_init_is_idempotent() {
        init();
        init();
    }
}
