use tracing_subscriber::{
    fmt::Layer, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Installs the json log layer on stderr, filtered by `RUST_LOG`. Defaults to
/// `info` for this crate.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("wallet_scanner=info"));

    tracing_subscriber::registry()
        .with(
            Layer::default()
                .json()
                .flatten_event(true)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}
