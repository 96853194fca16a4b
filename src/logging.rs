use once_cell::sync::OnceCell;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*};

const DEFAULT_FILTER: &str = "info";

static INITIALIZED: OnceCell<()> = OnceCell::new();

/// Installs a stderr fmt subscriber filtered by `RUST_LOG`. Later calls are
/// no-ops; a subscriber installed elsewhere is left in place.
pub fn init() {
    INITIALIZED.get_or_init(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let stderr_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
        let subscriber = Registry::default().with(env_filter).with(stderr_layer);
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            eprintln!("tracing subscriber already installed");
        }
    });
}
