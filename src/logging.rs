use tracing::Subscriber;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn default_directive(verbose: bool) -> &'static str {
    if verbose { "routing_visualizer=debug" } else { "routing_visualizer=info" }
}

fn subscriber(filter: EnvFilter) -> impl Subscriber + Send + Sync + 'static {
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish()
}

/// Installs the global fmt subscriber. `RUST_LOG` wins over `verbose` when set.
/// Returns false if a subscriber was already installed.
pub fn init(verbose: bool) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    tracing::subscriber::set_global_default(subscriber(filter)).is_ok()
}
