//! Telemetry initialization.
//!
//! Controlled by `DAR_LOG`:
//! - unset or empty → no subscriber (stdout/stderr carry only user output)
//! - `"json"` → JSON events to stderr, filtered by `RUST_LOG` (default `info`)
//! - anything else → used as an `EnvFilter` directive, compact text to stderr

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Environment variable that turns logging on.
pub const LOG_ENV: &str = "DAR_LOG";

/// Initialize logging based on `DAR_LOG`.
pub fn init() {
    let setting = std::env::var(LOG_ENV).ok();

    match setting.as_deref() {
        None | Some("") => {}
        Some("json") => init_json(),
        Some(directive) => init_text(directive),
    }
}

/// JSON events to stderr via tracing-subscriber's JSON formatter.
fn init_json() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .try_init();
}

fn init_text(directive: &str) {
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|e| {
        eprintln!("warning: invalid {LOG_ENV} value '{directive}': {e}");
        EnvFilter::new("info")
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .try_init();
}
