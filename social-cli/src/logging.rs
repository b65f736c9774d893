use anyhow::{Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt};

/// Шум HTTP-стека глушится, если уровень не задан через `RUST_LOG` явно.
const QUIET_DEPENDENCIES: &str = "hyper_util=warn,reqwest=warn";

/// Логи идут в stderr, чтобы не смешиваться с выводом команд.
pub fn init_logging(default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(default_level)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(())
}

fn default_directives(level: &str) -> String {
    format!("{},{QUIET_DEPENDENCIES}", level.trim())
}
