// ABOUTME: Process-wide tracing setup for applications using the atomix client
// ABOUTME: Three functions: init() for stderr, init_for() for one crate, init_test() for test runs

use tracing_subscriber::EnvFilter;

/// Standard logging to stderr. Default: INFO level, RUST_LOG override.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();
}

/// Crate-filtered logging to stderr. Default: INFO for named crate, WARN for everything else.
///
/// Useful for applications that want watch failures from `atomix_client` without
/// the h2/tonic connection chatter.
pub fn init_for(crate_name: &str) {
    let filter = EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into())
        .add_directive(
            format!("{crate_name}=info")
                .parse()
                .unwrap_or_else(|_| tracing::Level::INFO.into()),
        );

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Logging for test binaries. Captured by the test harness, DEBUG by default.
///
/// Safe to call from every test: only the first call installs a subscriber.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}
