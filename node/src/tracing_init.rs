//! Installs the single global `tracing` subscriber for the node
//! process (`SPEC_FULL.md §B`: one subscriber, installed here, with
//! module code only ever emitting through the `tracing` facade).

pub fn init(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level.to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
