//! Tracing setup and per-component spans
//!
//! Components never log through ambient state of their own: each one is
//! handed a [`Span`] at construction and emits inside it. Installing a
//! subscriber is left to the embedding application (or tests) via
//! [`init_tracing`] or [`init_tracing_from`].

use crate::config::RegistryConfig;
use crate::{Error, Result};
use tracing::Span;
use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber filtered by `RUST_LOG`, falling back to `default_filter`.
///
/// # Errors
///
/// Returns `Error::Config` if the directive is invalid or a global
/// subscriber is already installed.
pub fn init_tracing(default_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| Error::Config(format!("invalid log filter {default_filter:?}: {e}")))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| Error::Config(format!("tracing subscriber already installed: {e}")))
}

/// Install the subscriber with `config.log_filter` as the fallback directive.
///
/// # Errors
///
/// See [`init_tracing`].
pub fn init_tracing_from(config: &RegistryConfig) -> Result<()> {
    init_tracing(&config.log_filter)
}

/// Span for a registry component, e.g. `component_span("lifecycle")`.
#[must_use]
pub fn component_span(component: &'static str) -> Span {
    tracing::info_span!("trueno_registry", component)
}
