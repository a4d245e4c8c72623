//! Error types used by the reconvisor runtime, retrievers and handlers.
//!
//! This module defines four error enums:
//!
//! - [`BuildError`]: invalid or missing configuration at construction time.
//! - [`RuntimeError`]: errors returned by [`Controller::run`](crate::Controller::run).
//! - [`SourceError`]: errors raised by a [`Retriever`](crate::Retriever).
//! - [`HandlerError`]: errors raised by a single [`Handler`](crate::Handler) invocation.
//!
//! Every type provides `as_label` (stable snake_case label for logs/metrics) and
//! `as_message` helpers. Only [`BuildError`] and [`RuntimeError`] ever reach the caller;
//! handler failures stay inside the queue's retry mechanism.

use std::any::Any;
use std::time::Duration;
use thiserror::Error;

/// # Errors produced while building a controller.
///
/// Returned by [`ControllerBuilder::build`](crate::ControllerBuilder::build); nothing
/// has been started when one of these is returned.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// No handler was supplied.
    #[error("handler is required")]
    MissingHandler,

    /// No retriever was supplied.
    #[error("retriever is required")]
    MissingRetriever,

    /// A configuration value is out of range.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: String,
    },
}

impl BuildError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use reconvisor::BuildError;
    ///
    /// assert_eq!(BuildError::MissingHandler.as_label(), "build_missing_handler");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BuildError::MissingHandler => "build_missing_handler",
            BuildError::MissingRetriever => "build_missing_retriever",
            BuildError::InvalidConfig { .. } => "build_invalid_config",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            BuildError::MissingHandler => "missing handler".to_string(),
            BuildError::MissingRetriever => "missing retriever".to_string(),
            BuildError::InvalidConfig { reason } => format!("invalid config: {reason}"),
        }
    }
}

/// # Errors produced by a retriever.
///
/// Where the error happens decides how it is treated: a failed `list` is fatal for the
/// running period, a failed or expired watch triggers a relist.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Listing the resources failed.
    #[error("list failed: {reason}")]
    List {
        /// The underlying error message.
        reason: String,
    },

    /// Opening or reading the watch stream failed.
    #[error("watch failed: {reason}")]
    Watch {
        /// The underlying error message.
        reason: String,
    },

    /// The watch start version is no longer available on the remote side.
    #[error("resource version {version} expired")]
    Expired {
        /// The version that was rejected.
        version: String,
    },
}

impl SourceError {
    /// Shorthand for [`SourceError::List`].
    pub fn list(reason: impl Into<String>) -> Self {
        SourceError::List {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`SourceError::Watch`].
    pub fn watch(reason: impl Into<String>) -> Self {
        SourceError::Watch {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SourceError::List { .. } => "source_list_failed",
            SourceError::Watch { .. } => "source_watch_failed",
            SourceError::Expired { .. } => "source_version_expired",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            SourceError::List { reason } => format!("list: {reason}"),
            SourceError::Watch { reason } => format!("watch: {reason}"),
            SourceError::Expired { version } => format!("expired: {version}"),
        }
    }
}

/// # Errors returned by [`Controller::run`](crate::Controller::run).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The event source could not list resources; the running period was stopped.
    #[error("event source failed: {0}")]
    Source(#[from] SourceError),

    /// `run` was called on a controller that already ran; build a new one.
    #[error("controller already ran; a new instance is required")]
    AlreadyRun,

    /// Drain window was exceeded; some handlers were still running and were detached.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}; detaching workers")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Keys whose handler invocations did not return in time.
        stuck: Vec<String>,
    },

    /// OS signal listeners could not be registered by `run_until_signal`.
    #[error("signal registration failed: {reason}")]
    Signal {
        /// The underlying I/O error message.
        reason: String,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use reconvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Source(_) => "runtime_source_failed",
            RuntimeError::AlreadyRun => "runtime_already_run",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Signal { .. } => "runtime_signal_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::Source(e) => format!("source: {}", e.as_message()),
            RuntimeError::AlreadyRun => "already ran".to_string(),
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck keys={stuck:?}")
            }
            RuntimeError::Signal { reason } => format!("signal: {reason}"),
        }
    }
}

/// # Errors produced by a handler invocation.
///
/// `Fail` and `Timeout` are retried with backoff; `Fatal` drops the key at once.
/// `Canceled` is a graceful exit only when the runtime cancelled the invocation;
/// returned on its own it is retried like `Fail`.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// Invocation exceeded the configured processing timeout.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Non-recoverable error (should not be retried).
    #[error("fatal error (no retry): {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// Invocation failed but may succeed if retried.
    #[error("handling failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Invocation was cancelled because the running period is stopping.
    #[error("context cancelled")]
    Canceled,
}

impl HandlerError {
    /// Shorthand for [`HandlerError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        HandlerError::Fail {
            error: error.into(),
        }
    }

    /// Builds the retryable error reported for a handler that panicked.
    pub(crate) fn panicked(payload: &(dyn Any + Send)) -> Self {
        HandlerError::fail(format!("handler panicked: {}", panic_message(payload)))
    }

    /// Shorthand for [`HandlerError::Fatal`].
    pub fn fatal(error: impl Into<String>) -> Self {
        HandlerError::Fatal {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use reconvisor::HandlerError;
    /// use std::time::Duration;
    ///
    /// let err = HandlerError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "handler_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Timeout { .. } => "handler_timeout",
            HandlerError::Fatal { .. } => "handler_fatal",
            HandlerError::Fail { .. } => "handler_failed",
            HandlerError::Canceled => "handler_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            HandlerError::Timeout { timeout } => format!("timeout: {timeout:?}"),
            HandlerError::Fatal { error } => format!("fatal: {error}"),
            HandlerError::Fail { error } => format!("error: {error}"),
            HandlerError::Canceled => "context cancelled".to_string(),
        }
    }

    /// Indicates whether the key should be requeued with backoff.
    ///
    /// Returns `true` for [`HandlerError::Fail`] and [`HandlerError::Timeout`],
    /// `false` otherwise.
    ///
    /// # Example
    /// ```
    /// use reconvisor::HandlerError;
    ///
    /// assert!(HandlerError::fail("boom").is_retryable());
    /// assert!(!HandlerError::fatal("nope").is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, HandlerError::Fail { .. } | HandlerError::Timeout { .. })
    }
}

/// Extracts the message of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
