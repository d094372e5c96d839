//! Tracing subscriber setup for the `folio` binary.

use tracing_subscriber::EnvFilter;

use crate::config::LogFormat;

const DEFAULT_DIRECTIVES: &str = "folio_server=info,folio_render=info,tower_http=info";

/// Install the global subscriber. `RUST_LOG` overrides the default directives.
///
/// Calling this twice is harmless: the second installation attempt is ignored.
pub fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
