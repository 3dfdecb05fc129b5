use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing for the host process.
///
/// Honours `RUST_LOG`; defaults to `info` for the imgdrop crates. `json` switches the
/// fmt layer to JSON lines. Logs go to stderr so stdout stays free for results.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "imgdrop=info,imgdrop_uploader=info,imgdrop_processing=info,imgdrop_storage=info,warn".into()
    });
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
