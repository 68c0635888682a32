//! Collection configuration.
//!
//! A [`CollectionConfig`] is fixed when a collection handle is constructed.
//! It names the page collection, sets the byte budget every page is sized
//! to, and carries the [`PageLayout`] overhead constants used by the
//! [budgeter](crate::budget).

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Smallest page byte budget a collection accepts.
pub const MIN_PAGE_SIZE: usize = 256;

/// Page byte budget used when none is configured.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Fixed header overhead of a page document, in bytes.
pub const PAGE_HEADER_SIZE: usize = 110;

/// Per-entry overhead of a stored timestamp including its wrapper, in bytes.
pub const TIMESTAMP_SIZE: usize = 66;

/// Suffix appended to the collection name to form the cursor collection.
pub const CURSOR_SUFFIX: &str = "_cursors";

/// Byte overheads of the persisted page encoding.
///
/// These must be recomputed if the page document encoding changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLayout {
    /// Bytes taken by a page document with an empty slot array.
    pub header_overhead: usize,
    /// Bytes added per slot on top of the encoded value.
    pub timestamp_overhead: usize,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            header_overhead: PAGE_HEADER_SIZE,
            timestamp_overhead: TIMESTAMP_SIZE,
        }
    }
}

/// Configuration for one time-series collection.
///
/// # Example
///
/// ```rust
/// use folio::config::CollectionConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = CollectionConfig::new("sensors", 4096)?;
/// assert_eq!(config.cursor_collection(), "sensors_cursors");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Name of the page collection.
    pub name: String,

    /// Byte budget of every page document.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Overhead constants of the page encoding.
    #[serde(default)]
    pub layout: PageLayout,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl CollectionConfig {
    /// Creates a validated configuration with the default page layout.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the name is empty or `page_size` is below
    /// [`MIN_PAGE_SIZE`].
    pub fn new(name: impl Into<String>, page_size: usize) -> Result<Self> {
        let config = Self {
            name: name.into(),
            page_size,
            layout: PageLayout::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Replaces the page layout.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidLayout`] if the page could not hold a
    /// single empty slot under the new layout.
    pub fn with_layout(mut self, layout: PageLayout) -> Result<Self> {
        self.layout = layout;
        self.validate()?;
        Ok(self)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if validation fails.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ConfigError::EmptyName.into());
        }

        if self.page_size < MIN_PAGE_SIZE {
            return Err(ConfigError::PageSizeTooSmall {
                page_size: self.page_size,
                min: MIN_PAGE_SIZE,
            }
            .into());
        }

        if self.layout.timestamp_overhead == 0 {
            return Err(ConfigError::InvalidLayout {
                reason: "timestamp overhead must be non-zero".to_string(),
            }
            .into());
        }

        let required = self.layout.header_overhead + self.layout.timestamp_overhead;
        if self.page_size < required {
            return Err(ConfigError::InvalidLayout {
                reason: format!(
                    "page size {} cannot hold header ({}) plus one slot ({})",
                    self.page_size, self.layout.header_overhead, self.layout.timestamp_overhead
                ),
            }
            .into());
        }

        Ok(())
    }

    /// Name of the collection holding the series cursors.
    pub fn cursor_collection(&self) -> String {
        format!("{}{}", self.name, CURSOR_SUFFIX)
    }
}
