use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Default directives when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "info,urs_mcp=debug";

/// Initialize logging.
///
/// - `EnvFilter` for dynamic log levels (`RUST_LOG`).
/// - Compact human-readable output, or one JSON object per line when `json`
///   is set.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init(json: bool) {
    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let (json_layer, compact_layer) = if json {
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true);
        (Some(layer), None)
    } else {
        let layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .compact();
        (None, Some(layer))
    };

    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(json_layer)
        .with(compact_layer)
        .try_init();
}
