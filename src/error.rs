//! Error types for the loadkit library.
//!
//! ## Key Components
//!
//! - [`CacheError`]: Returned by [`LoadingCache`](crate::cache::LoadingCache)
//!   operations. Distinguishes invalid arguments, loader failures, mutation
//!   of an immutable bulk result, recursive loads, and rejected writes.
//! - [`LoadError`]: Produced by a [`CacheLoader`](crate::loader::CacheLoader)
//!   when it cannot compute a value. Shared behind an `Arc` so every caller
//!   waiting on the same key observes the same failure.
//! - [`ConfigError`]: Returned when builder parameters are invalid
//!   (e.g. zero shards).
//!
//! ## Example Usage
//!
//! ```
//! use loadkit::builder::CacheBuilder;
//! use loadkit::error::CacheError;
//! use loadkit::loader::loader_fn;
//!
//! let cache = CacheBuilder::new(16).build(loader_fn(|k: &u64| Ok(k * 2)));
//!
//! // Null keys are rejected before the store or the stats are touched
//! let err = cache.get_checked(None).unwrap_err();
//! assert!(matches!(err, CacheError::InvalidArgument(_)));
//! assert_eq!(cache.stats().request_count(), 0);
//! ```

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// LoadError
// ---------------------------------------------------------------------------

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Error returned by a loader that failed to compute a value.
///
/// Carries a human-readable description and, optionally, the underlying
/// cause. The cache wraps it in an `Arc` before handing it to callers so one
/// failure can be delivered to every waiter of the same load.
#[derive(thiserror::Error)]
#[error("{message}")]
pub struct LoadError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl LoadError {
    /// Creates a new `LoadError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            source: None,
        }
    }

    /// Creates a `LoadError` wrapping an underlying cause.
    pub fn with_source(
        msg: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
    ) -> Self {
        Self {
            message: msg.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Debug for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_struct("LoadError");
        dbg.field("message", &self.message);
        if let Some(source) = &self.source {
            dbg.field("source", &format_args!("{source}"));
        }
        dbg.finish()
    }
}

// ---------------------------------------------------------------------------
// CacheError
// ---------------------------------------------------------------------------

/// Error returned by loading cache operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// A key, key sequence, or sequence element was null.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The loader failed for a requested key.
    ///
    /// Every caller attached to the same in-flight load receives the same
    /// shared error instance.
    #[error("load failed: {0}")]
    Load(#[source] Arc<LoadError>),

    /// A caller tried to mutate an immutable bulk result.
    #[error("bulk results are immutable")]
    ImmutableResult,

    /// A loader re-entered the cache for the key it is currently loading.
    #[error("recursive load detected for a key already being loaded by this thread")]
    RecursiveLoad,

    /// An explicit write was rejected because the store is at capacity.
    #[error("store is at capacity ({capacity} entries)")]
    StoreFull { capacity: usize },
}

impl CacheError {
    /// Returns the loader failure, if this is a [`CacheError::Load`].
    pub fn load_error(&self) -> Option<&Arc<LoadError>> {
        match self {
            CacheError::Load(err) => Some(err),
            _ => None,
        }
    }
}

impl From<LoadError> for CacheError {
    fn from(err: LoadError) -> Self {
        CacheError::Load(Arc::new(err))
    }
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when cache configuration parameters are invalid.
///
/// Produced by [`CacheBuilder::try_build`](crate::builder::CacheBuilder::try_build).
/// Carries a human-readable description of which parameter failed validation.
///
/// # Example
///
/// ```
/// use loadkit::builder::CacheBuilder;
/// use loadkit::loader::loader_fn;
///
/// let err = CacheBuilder::new(16)
///     .registry_shards(0)
///     .try_build(loader_fn(|k: &u64| Ok(*k)))
///     .unwrap_err();
/// assert!(err.to_string().contains("registry_shards"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- LoadError --------------------------------------------------------

    #[test]
    fn load_display_shows_message() {
        let err = LoadError::new("backend unavailable");
        assert_eq!(err.to_string(), "backend unavailable");
    }

    #[test]
    fn load_source_is_exposed() {
        let io = std::io::Error::other("connection reset");
        let err = LoadError::with_source("fetch failed", io);
        let source = err.source().expect("source should be set");
        assert_eq!(source.to_string(), "connection reset");
    }

    #[test]
    fn load_debug_includes_source() {
        let err = LoadError::with_source("fetch failed", "timeout");
        let dbg = format!("{:?}", err);
        assert!(dbg.contains("fetch failed"));
        assert!(dbg.contains("timeout"));
    }

    // -- CacheError -------------------------------------------------------

    #[test]
    fn cache_error_wraps_load_error() {
        let err: CacheError = LoadError::new("boom").into();
        assert_eq!(err.load_error().map(|e| e.message()), Some("boom"));
        assert_eq!(err.to_string(), "load failed: boom");
    }

    #[test]
    fn cache_error_clone_shares_load_error() {
        let err: CacheError = LoadError::new("boom").into();
        let copy = err.clone();
        let (a, b) = (err.load_error().unwrap(), copy.load_error().unwrap());
        assert!(Arc::ptr_eq(a, b));
    }

    #[test]
    fn invalid_argument_display() {
        let err = CacheError::InvalidArgument("key must not be null");
        assert_eq!(err.to_string(), "invalid argument: key must not be null");
        assert!(err.load_error().is_none());
    }

    // -- ConfigError ------------------------------------------------------

    #[test]
    fn config_display_shows_message() {
        let err = ConfigError::new("registry_shards must be > 0");
        assert_eq!(err.to_string(), "registry_shards must be > 0");
    }

    #[test]
    fn config_message_accessor() {
        let err = ConfigError::new("test");
        assert_eq!(err.message(), "test");
    }

    #[test]
    fn errors_implement_std_error() {
        fn assert_error<T: std::error::Error + Send + Sync>() {}
        assert_error::<LoadError>();
        assert_error::<CacheError>();
        assert_error::<ConfigError>();
    }
}
