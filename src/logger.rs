//! Four-level logger capability used by the transport core.
//!
//! The client never reaches for global logging state on its own; it logs
//! through the [`Logger`] it was built with. [`TracingLogger`] is the default
//! and forwards into `tracing`, which stays silent until the application
//! installs a subscriber. [`NoopLogger`] drops everything.

use std::fmt;

/// Minimal logging capability: debug, info, warn and error.
///
/// # Examples
///
/// ```
/// use controlplane_client::Logger;
/// use std::fmt;
/// use std::sync::Mutex;
///
/// #[derive(Default)]
/// struct Collect(Mutex<Vec<String>>);
///
/// impl Logger for Collect {
///     fn debug(&self, _args: fmt::Arguments<'_>) {}
///     fn info(&self, args: fmt::Arguments<'_>) {
///         self.0.lock().unwrap().push(args.to_string());
///     }
///     fn warn(&self, args: fmt::Arguments<'_>) {
///         self.0.lock().unwrap().push(args.to_string());
///     }
///     fn error(&self, args: fmt::Arguments<'_>) {
///         self.0.lock().unwrap().push(args.to_string());
///     }
/// }
/// ```
pub trait Logger: Send + Sync {
    /// Per-attempt detail.
    fn debug(&self, args: fmt::Arguments<'_>);
    /// Notable but expected events, such as a scheduled retry.
    fn info(&self, args: fmt::Arguments<'_>);
    /// Failures the client may still recover from.
    fn warn(&self, args: fmt::Arguments<'_>);
    /// Failures surfaced to the caller.
    fn error(&self, args: fmt::Arguments<'_>);
}

/// Forwards to the `tracing` macros under the `controlplane_client` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(target: "controlplane_client", "{}", args);
    }

    fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!(target: "controlplane_client", "{}", args);
    }

    fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(target: "controlplane_client", "{}", args);
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        tracing::error!(target: "controlplane_client", "{}", args);
    }
}

/// Discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn debug(&self, _args: fmt::Arguments<'_>) {}
    fn info(&self, _args: fmt::Arguments<'_>) {}
    fn warn(&self, _args: fmt::Arguments<'_>) {}
    fn error(&self, _args: fmt::Arguments<'_>) {}
}
