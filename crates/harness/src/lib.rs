mod network;
mod peer;

pub use network::{prefer_greater_author, TestNetwork};
pub use peer::{TestPeer, EPOCH};

/// Installs a `RUST_LOG`-filtered subscriber writing to the test output.
/// Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
