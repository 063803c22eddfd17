use tracing_subscriber::EnvFilter;

/// Initialise logging for library consumers. The default level is `info`;
/// passing `debug: true` (the settings flag) raises this crate to `debug`
/// and lets `RUST_LOG` override the filter entirely.
pub fn init(debug: bool) {
    let filter = if debug {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,slide_retouch=debug"))
    } else {
        // Force `info` so a stray RUST_LOG in the environment cannot make
        // batch runs unexpectedly verbose.
        EnvFilter::new("info")
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
