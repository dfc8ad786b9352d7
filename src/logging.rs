use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Sets up the diagnostics printed on stderr.
///
/// Only warnings are shown unless `verbose` is set, and `RUST_LOG` overrides both.
pub fn init(verbose: bool) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| {
        if verbose {
            EnvFilter::try_new("viewclient=debug,viewclient_runner=debug,warn")
        } else {
            EnvFilter::try_new("warn")
        }
    })?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose)
                .with_thread_names(verbose)
                .without_time()
                .compact(),
        )
        .try_init()?;

    Ok(())
}
