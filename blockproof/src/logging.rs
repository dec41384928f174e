//! Log output for processes embedding the auditor.
//!
//! The auditor only emits `tracing` events; installing a subscriber is left to the embedding
//! process. [`init`] installs the standard one.

use std::io::{self, IsTerminal as _};

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, EnvFilter};

/// The environment variable holding the log filter directives, e.g. `blockproof=debug`.
pub const ENV_NAME: &str = "BLOCKPROOF_LOG";

fn istty() -> bool {
    io::stdout().is_terminal() && io::stderr().is_terminal()
}

/// Creates the env filter from [`ENV_NAME`], defaulting to `INFO`.
fn env_filter() -> anyhow::Result<EnvFilter> {
    let builder = EnvFilter::builder().with_default_directive(LevelFilter::INFO.into());
    let directives = match std::env::var(ENV_NAME) {
        Ok(env) => env,
        Err(std::env::VarError::NotPresent) => String::new(),
        Err(std::env::VarError::NotUnicode(_)) => {
            anyhow::bail!("environment variable {} is not unicode", ENV_NAME)
        }
    };
    Ok(builder.parse(directives)?)
}

/// Install a compact stdout subscriber as the global default.
///
/// Fails if the filter in [`ENV_NAME`] does not parse or a global subscriber is already set.
pub fn init() -> anyhow::Result<()> {
    let format = fmt::format()
        .with_level(true)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .compact()
        .with_timer(fmt::time::SystemTime);
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(env_filter()?)
        .with_writer(io::stdout)
        .with_ansi(istty())
        .event_format(format)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
