//! Diagnostics setup.
//!
//! Compact timestamped output with per-target levels. Quiet (`warn`) unless
//! configured otherwise.
//!
//! ```toml
//! [logging]
//! default = "warn"
//!
//! [logging.modules]
//! "flexpreset::watcher" = "debug"
//! ```
//!
//! `RUST_LOG` takes precedence over config:
//! ```bash
//! RUST_LOG=flexpreset=debug flexpreset watch
//! ```

use std::sync::Once;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

const TIME_FORMAT: &str = "%H:%M:%S%.3f";

/// Build the `EnvFilter` directive string for a config.
fn directives(config: &LoggingConfig) -> String {
    let mut modules: Vec<_> = config.modules.iter().collect();
    modules.sort();
    let mut filter = config.default.clone();
    for (module, level) in modules {
        filter.push_str(&format!(",{module}={level}"));
    }
    filter
}

/// Install the global subscriber. Only the first call takes effect.
///
/// Output goes to stderr so `watch` can keep stdout for JSON lines.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(directives(config))
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
            .with_level(true)
            .with_filter(filter);

        // A subscriber installed elsewhere (tests, embedding host) wins
        let _ = tracing_subscriber::registry().with(fmt_layer).try_init();
    });
}

pub fn init() {
    init_with_config(&LoggingConfig::default());
}

/// Info-level event tagged with `component` and `event` fields, so a
/// filter or JSON sink can pick out e.g. every `store` reload.
///
/// ```ignore
/// log_event!("watcher", "started");
/// log_event!("store", "reloaded", "{name}: {} presets changed", n);
/// ```
#[macro_export]
macro_rules! log_event {
    ($component:expr, $event:expr) => {
        tracing::info!(component = $component, event = $event)
    };
    ($component:expr, $event:expr, $($arg:tt)+) => {
        tracing::info!(component = $component, event = $event, $($arg)+)
    };
}

/// [`log_event!`] at debug level.
#[macro_export]
macro_rules! debug_event {
    ($component:expr, $event:expr) => {
        tracing::debug!(component = $component, event = $event)
    };
    ($component:expr, $event:expr, $($arg:tt)+) => {
        tracing::debug!(component = $component, event = $event, $($arg)+)
    };
}
