use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs a fmt subscriber filtered by `RUST_LOG`, defaulting to info with debug output
/// for this crate. Calling it more than once is harmless, later calls are ignored.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,dxframe_rs=debug"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}
