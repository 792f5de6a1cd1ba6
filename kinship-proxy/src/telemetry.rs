//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use kinship_core::config::GeneralConfig;

/// Install the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` when set, else from
/// `general.log_level`. `general.log_format = "json"` selects JSON lines;
/// anything else gets the human-readable format.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init(general: &GeneralConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&general.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = if general.log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt().with_env_filter(filter).json().try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };
    installed.is_ok()
}
