use std::path::Path;

use tracing::Span;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_FILTER: &str = "classmodel=info,warn";
const QUIET_FILTER: &str = "error";

/// Initialize logging facade with stderr output.
pub(crate) fn init_logging(quiet: bool) {
    let init_result = tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter(quiet))),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
    let _ = init_result;
}

fn default_filter(quiet: bool) -> &'static str {
    if quiet { QUIET_FILTER } else { DEFAULT_FILTER }
}

/// Span wrapping the build of a single class file.
pub(crate) fn class_span(path: &Path) -> Span {
    tracing::debug_span!("class.build", class_path = %path.display())
}
