//! # folio
//!
//! Paged append-only time-series collections over a document store.
//!
//! folio stores each series as a chain of fixed-budget *pages*. A page is a
//! single document holding a preallocated array of timestamp/value slots, so
//! a series of a million entries costs a few thousand documents instead of a
//! million, and a range query reads only the pages whose boundaries overlap
//! the requested window.
//!
//! **Status**: This crate is in early development. The API is not yet stable.
//!
//! ## Key Properties
//!
//! - Strictly increasing timestamps per series, enforced by one conditional
//!   update on the series cursor; no locks, no retries inside the engine
//! - Page capacity sized from a byte budget and the first value of the page
//! - Contiguous page boundaries: each page starts where the previous one ended
//! - Newest entry served from the cursor cache without touching any page
//! - Pluggable backing store ([`MemoryBackend`], [`FileBackend`]) and value
//!   encoding ([`RawCodec`], [`JsonCodec`])
//!
//! ## Quick Start
//!
//! ```rust
//! use folio::{Collection, CollectionConfig, JsonCodec, MemoryBackend};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // 4 KiB pages
//! let config = CollectionConfig::new("cpu", 4096)?;
//! let cpu = Collection::new(MemoryBackend::new(), JsonCodec::<f64>::new(), config)?;
//!
//! // Register a series
//! let host = "web1".to_string();
//! cpu.create_series(&host, 0)?;
//!
//! // Append entries, timestamps in nanoseconds
//! cpu.append(&host, 1_640_000_000_000_000_000, &85.5)?;
//! cpu.append(&host, 1_640_000_001_000_000_000, &86.0)?;
//!
//! // Query data back
//! for point in cpu.range(&host, 0, u64::MAX)? {
//!     println!("{}: {}", point.timestamp, point.decode(cpu.codec())?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`Collection`]: Top-level handle; create, append, update, range, latest
//! - [`CollectionConfig`]: Collection name, page byte budget, page layout
//! - [`Backend`]: Document store seam with the conditional updates the
//!   engine relies on
//! - [`ValueCodec`]: Maps caller values to the bytes stored in slots
//!
//! ## Modules
//!
//! For lower-level access, the individual modules are also public:
//!
//! - [`collection`]: Public operations
//! - [`append`]: Cursor transition, rollover, slot writes
//! - [`range`]: Range scans over page chains
//! - [`budget`]: Page capacity from a byte budget
//! - [`cursor`]: Series cursor documents
//! - [`page`]: Page documents
//! - [`backend`]: In-memory and file-backed stores
//! - [`codec`]: Value encodings
//! - [`retry`]: Caller-side retry for stale appends
//! - [`model`]: Document and result types
//! - [`config`]: Configuration and layout constants
//! - [`error`]: Error types

pub mod append;
pub mod backend;
pub mod budget;
pub mod codec;
pub mod collection;
pub mod config;
pub mod cursor;
pub mod error;
pub mod model;
pub mod page;
pub mod range;
pub mod retry;

// Re-export primary API types at crate root for convenience.
pub use backend::{Backend, FileBackend, MemoryBackend};
pub use codec::{JsonCodec, RawCodec, ValueCodec};
pub use collection::Collection;
pub use config::{CollectionConfig, PageLayout};
pub use error::{FolioError, Result};
pub use model::{DataPoint, PageId, PageInfo, SeriesKey, TIME_ZERO};
pub use retry::{ExponentialBackoff, NoRetry, RetryPolicy, append_with_retry};
