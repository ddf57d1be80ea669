//! SBITS: an embedded, append-only key-value storage engine for
//! time-series data, with fixed-size pages, a circular wrap-around
//! allocator, and an optional secondary bitmap index for data-range scans.
//!
//! Single-threaded and non-reentrant: every mutating call on
//! [`StorageEngine`] takes `&mut self`.

pub mod allocator;
pub mod bitmap;
pub mod buffer;
pub mod comparator;
pub mod config;
pub mod engine;
mod error;
pub mod iter;
pub mod page;
pub mod stats;
pub mod storage;

pub use crate::bitmap::{BitmapEncoder, BucketBitmap};
pub use crate::comparator::{DataComparator, KeyComparator, U32DataComparator, U32KeyComparator, U64KeyComparator};
pub use crate::config::{Parameters, SearchStrategy, StorageConfig};
pub use crate::engine::StorageEngine;
pub use crate::error::{Error, Result};
pub use crate::iter::{RangeQuery, ScanIterator};
pub use crate::stats::Stats;
pub use crate::storage::{BlockStorage, FileBlockStorage};
