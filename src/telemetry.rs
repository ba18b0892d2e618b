//! Tracing setup for applications embedding `chart-refresh`.
//!
//! Pass-level decisions (disabled skip, coalesced request, fan-out, pass
//! failure) are logged at `debug`/`warn` under `chart_refresh::api`. Epoch
//! allocation and gate resets are logged at `trace` under
//! [`SEQUENCE_TARGET`], which is usually only worth enabling while chasing a
//! wedged gate.

/// Target of the per-epoch gate events emitted by the sequence counters.
pub const SEQUENCE_TARGET: &str = "chart_refresh::core::sequence";

/// Directive used for the crate when `RUST_LOG` is not set.
pub const DEFAULT_DIRECTIVE: &str = "chart_refresh=info";

/// Builds the filter directives installed by [`init_tracing`].
///
/// With `trace_gates` the sequence-counter events are raised to `trace`
/// while the rest of the crate stays at `info`.
#[must_use]
pub fn filter_directives(trace_gates: bool) -> String {
    if trace_gates {
        format!("{DEFAULT_DIRECTIVE},{SEQUENCE_TARGET}=trace")
    } else {
        DEFAULT_DIRECTIVE.to_owned()
    }
}

/// Installs a compact `tracing` subscriber filtered by `RUST_LOG`, falling
/// back to `directives` when the variable is unset or malformed.
///
/// Returns `false` without the `telemetry` feature, or when the host already
/// installed a global subscriber.
#[must_use]
pub fn init_tracing(directives: &str) -> bool {
    #[cfg(feature = "telemetry")]
    {
        use tracing_subscriber::EnvFilter;

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));
        return tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .compact()
            .try_init()
            .is_ok();
    }

    #[cfg(not(feature = "telemetry"))]
    {
        let _ = directives;
        false
    }
}

/// [`init_tracing`] with the crate at `info` and gate tracing off.
#[must_use]
pub fn init_default_tracing() -> bool {
    init_tracing(&filter_directives(false))
}
