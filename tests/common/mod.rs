use std::sync::Once;

static INIT: Once = Once::new();

/// Configure the may runtime and a test tracing subscriber once per binary.
pub fn setup() {
    INIT.call_once(|| {
        opdispatch::config::RuntimeConfig::from_env().install();
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_test_writer()
            .try_init();
    });
}
