//! # Tracing setup for binaries embedding the supervisor.

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const LOG_ENV: &str = "MODVISOR_LOG";

/// Installs a global fmt subscriber.
///
/// The filter comes from `MODVISOR_LOG`, then `RUST_LOG`, else `info`. An
/// invalid `MODVISOR_LOG` directive is reported on stderr and ignored.
/// Calling it again once a subscriber is installed is a no-op.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(true))
        .try_init()
        .ok();
}

fn env_filter() -> EnvFilter {
    match std::env::var(LOG_ENV) {
        Ok(directive) => EnvFilter::try_new(&directive).unwrap_or_else(|err| {
            eprintln!("invalid {LOG_ENV} directive '{directive}' ({err}); using info");
            EnvFilter::new("info")
        }),
        Err(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_twice_is_harmless() {
        init_tracing();
        init_tracing();
        tracing::info!("still logging");
    }
}
