//! Error types for folio collections.
//!
//! Callers are expected to branch on the typed kinds ([`ConfigError`],
//! [`SeriesError`], [`PageError`]). Everything coming out of the backing
//! store or the value codec is wrapped in [`FolioError::Backend`] together
//! with a short description of the operation that was in progress.

use thiserror::Error;

/// The main error type for all folio operations.
#[derive(Error, Debug)]
pub enum FolioError {
    /// The collection configuration was rejected at construction time.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A series-level precondition failed.
    #[error("series error: {0}")]
    Series(#[from] SeriesError),

    /// A value could not be placed into a page.
    #[error("page error: {0}")]
    Page(#[from] PageError),

    /// A lower-level failure, wrapped with the operation in progress.
    #[error("{context}: {source}")]
    Backend {
        /// What the collection was doing when the failure happened.
        context: String,
        /// The underlying failure.
        #[source]
        source: BackendError,
    },
}

impl FolioError {
    /// Wraps a backend failure with a description of the current operation.
    pub fn backend(context: impl Into<String>, source: BackendError) -> Self {
        FolioError::Backend {
            context: context.into(),
            source,
        }
    }

    /// Returns `true` for [`SeriesError::NotFoundOrStale`].
    ///
    /// This is the only kind a caller-side retry loop should react to.
    pub fn is_stale(&self) -> bool {
        matches!(self, FolioError::Series(SeriesError::NotFoundOrStale))
    }

    /// Returns `true` for [`SeriesError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, FolioError::Series(SeriesError::NotFound))
    }

    /// Returns `true` for [`SeriesError::DuplicateSeries`].
    pub fn is_duplicate(&self) -> bool {
        matches!(self, FolioError::Series(SeriesError::DuplicateSeries))
    }

    /// Returns `true` when the failure is a broken storage invariant.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            FolioError::Backend {
                source: BackendError::InvariantViolation { .. },
                ..
            }
        )
    }
}

/// Errors raised while validating a [`CollectionConfig`](crate::config::CollectionConfig).
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// The page byte budget is below the supported minimum.
    #[error("page size {page_size} is below the minimum of {min} bytes")]
    PageSizeTooSmall {
        /// The configured page size.
        page_size: usize,
        /// The minimum accepted page size.
        min: usize,
    },

    /// The collection name is empty.
    #[error("collection name cannot be empty")]
    EmptyName,

    /// The page layout cannot hold even a single empty slot.
    #[error("invalid page layout: {reason}")]
    InvalidLayout {
        /// Why the layout was rejected.
        reason: String,
    },
}

/// Errors about the existence or state of a series.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SeriesError {
    /// `create_series` was called for an id that already has a cursor.
    #[error("a series already exists with the specified id")]
    DuplicateSeries,

    /// No cursor exists for the id.
    #[error("series not found in the collection")]
    NotFound,

    /// The conditional cursor update matched nothing.
    ///
    /// Either the series does not exist or the timestamp is not strictly
    /// newer than the last accepted one. The two causes are indistinguishable.
    #[error("series does not exist or the timestamp is not newer than the last entry")]
    NotFoundOrStale,
}

/// Errors raised while sizing a page for a value.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PageError {
    /// Not even one slot of this value fits in a page.
    #[error("value of {value_size} bytes does not fit in a {page_size} byte page")]
    ValueTooLarge {
        /// Encoded size of the rejected value.
        value_size: usize,
        /// The configured page byte budget.
        page_size: usize,
    },
}

/// Failures of the backing store or value codec.
#[derive(Error, Debug)]
pub enum BackendError {
    /// An insert collided with an existing document key.
    #[error("duplicate key in collection '{collection}'")]
    DuplicateKey {
        /// The collection the insert targeted.
        collection: String,
    },

    /// Reading or writing a collection file failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        /// The file involved.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A collection file could not be (de)serialized.
    #[error("failed to (de)serialize collection '{collection}': {source}")]
    Serialize {
        /// The collection involved.
        collection: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A collection name cannot be used by the store.
    #[error("invalid collection name '{name}'")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// A value could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A lock guarding in-memory documents was poisoned by a panicking writer.
    #[error("document lock poisoned")]
    Poisoned,

    /// A document the engine relies on is missing or malformed.
    #[error("invariant violation: {reason}")]
    InvariantViolation {
        /// What was found to be inconsistent.
        reason: String,
    },
}

/// Errors produced by a [`ValueCodec`](crate::codec::ValueCodec).
#[derive(Error, Debug)]
pub enum CodecError {
    /// JSON encoding or decoding failed.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// Any other codec-specific failure.
    #[error("{0}")]
    Other(String),
}

/// Type alias for `Result<T, FolioError>`.
pub type Result<T> = std::result::Result<T, FolioError>;

/// Type alias for results of backing-store calls.
pub type BackendResult<T> = std::result::Result<T, BackendError>;
