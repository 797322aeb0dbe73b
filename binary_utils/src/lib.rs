use std::io::{self, IsTerminal as _};

use anyhow::Result;
use chrono::{Local, SecondsFormat};
use tracing::debug;
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{self, format::Writer, time::FormatTime},
    prelude::*,
    EnvFilter, Registry,
};

pub const LOG_ENV_VARIABLE: &str = "BLOB_ARCHIVER_LOG";

const WORKSPACE_CRATES: &[&str] = &[
    "archive_store",
    "beacon_api",
    "binary_utils",
    "blob_resolver",
    "clock",
    "database",
    "http_api",
    "sweeper",
];

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> core::fmt::Result {
        write!(
            w,
            "[{}]",
            Local::now().to_rfc3339_opts(SecondsFormat::Millis, true)
        )
    }
}

/// Installs the global `tracing` subscriber.
///
/// Crates of the workspace and `module_path` log at `info` by default.
/// Directives in the `BLOB_ARCHIVER_LOG` environment variable are applied on top.
pub fn initialize_tracing_logger(module_path: &str, always_write_style: bool) -> Result<()> {
    let env_directives = std::env::var(LOG_ENV_VARIABLE).ok();
    let filter = log_filter(module_path, env_directives.as_deref())?;

    let enable_ansi = always_write_style || io::stdout().is_terminal();

    let stdout_layer = fmt::layer::<Registry>()
        .compact()
        .with_thread_ids(false)
        .with_target(true)
        .with_file(false)
        .with_line_number(true)
        .with_timer(LocalTimer)
        .with_ansi(enable_ansi)
        .with_filter(filter);

    tracing_subscriber::registry().with(stdout_layer).try_init()?;

    debug!("tracing started");

    Ok(())
}

fn log_filter(module_path: &str, env_directives: Option<&str>) -> Result<EnvFilter> {
    let mut filter = EnvFilter::default().add_directive(LevelFilter::OFF.into());

    for crate_name in WORKSPACE_CRATES.iter().copied().chain([module_path]) {
        filter = filter.add_directive(format!("{crate_name}=info").parse()?);
    }

    let env_directives = env_directives
        .into_iter()
        .flat_map(|directives| directives.split(','))
        .map(str::trim)
        .filter(|directive| !directive.is_empty());

    for directive in env_directives {
        filter = filter.add_directive(directive.parse()?);
    }

    Ok(filter)
}
