//! Common test utilities: tracing setup shared by the integration tests.
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//!
//! #[test]
//! fn my_test() {
//!     common::init_tracing();
//!     // ... test code with tracing::info!, tracing::debug!, etc.
//! }
//! ```
//!
//! # Configuration
//!
//! Environment variables:
//! - `RUST_LOG`: filter directives (e.g. `sdatrie=debug`)
//! - `SDATRIE_LOG_DIR`: log directory (default: `logs/`)
//! - `SDATRIE_LOG_CONSOLE`: set to "0" to disable console output
//!
//! Logs are written to `logs/sdatrie.ndjson`, one JSON object per line.

#![allow(dead_code)]

use std::env;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::{Mutex, Once};

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Ensures tracing is only initialized once across all tests.
static INIT: Once = Once::new();

/// Initialize the tracing subscriber with file and console logging.
///
/// Safe to call multiple times - only the first call takes effect.
pub fn init_tracing() {
    INIT.call_once(setup_tracing);
}

fn make_filter(default_level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("{default_level}")))
}

#[expect(clippy::expect_used, reason = "fail fast in test setup")]
fn setup_tracing() {
    let log_dir = env::var("SDATRIE_LOG_DIR").map_or_else(|_| PathBuf::from("logs"), PathBuf::from);
    let console_enabled = !env::var("SDATRIE_LOG_CONSOLE").is_ok_and(|v| v == "0");

    std::fs::create_dir_all(&log_dir).expect("Failed to create log directory");

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_dir.join("sdatrie.ndjson"))
        .expect("Failed to create log file");

    // Leaked so the writer has a 'static lifetime for the subscriber.
    let file: &'static Mutex<File> = Box::leak(Box::new(Mutex::new(file)));

    let console_layer = console_enabled.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .compact()
            .with_filter(make_filter(Level::INFO))
    });

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(move || {
            file.lock()
                .expect("log file mutex poisoned")
                .try_clone()
                .expect("log file handle clone failed")
        })
        .with_target(true)
        .json()
        .with_filter(make_filter(Level::INFO));

    // try_init so a second subscriber (e.g. from another harness) is not a
    // hard failure.
    let _ = Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init();
}
