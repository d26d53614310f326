//! SDSL Tools
//!
//! Command line driver for the shader compiler, plus the built-in
//! intrinsic library it registers with every compilation.

pub mod intrinsics;

pub use intrinsics::Intrinsics;

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize logging with a default filter.
///
/// Use `RUST_LOG` environment variable to override the default filter.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,sdsl=info,sdsl_tools=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
