use std::path::PathBuf;
use std::sync::Arc;

use crate::bitmap::BitmapEncoder;
use crate::comparator::{DataComparator, KeyComparator};
use crate::error::{Error, Result};

/// Bit flags for [`StorageConfig::parameters`], bit-compatible with the
/// original four-flag configuration blob: `INDEX`, `MAX_MIN`, `SUM`, `BMAP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Parameters(u8);

impl Parameters {
    pub const NONE: Parameters = Parameters(0);
    pub const INDEX: Parameters = Parameters(1);
    pub const MAX_MIN: Parameters = Parameters(2);
    /// Accepted for bit-compatibility with existing configuration blobs.
    /// No query mode in this engine reads or maintains a running sum, so
    /// setting this bit has no behavioral effect.
    pub const SUM: Parameters = Parameters(4);
    pub const BMAP: Parameters = Parameters(8);

    pub const fn contains(self, flag: Parameters) -> bool {
        self.0 & flag.0 == flag.0
    }

    pub const fn union(self, other: Parameters) -> Parameters {
        Parameters(self.0 | other.0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn from_bits(bits: u8) -> Parameters {
        Parameters(bits)
    }
}

impl std::ops::BitOr for Parameters {
    type Output = Parameters;
    fn bitor(self, rhs: Parameters) -> Parameters {
        self.union(rhs)
    }
}

/// Point-lookup search algorithm. `Interpolated` is the engine default; the
/// permitted "compile-time alternative" in the design notes is modeled as a
/// runtime switch instead of a Cargo feature, since every other dimension of
/// this engine (page/key/data sizes) is already a runtime parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchStrategy {
    #[default]
    Interpolated,
    BinaryOnly,
}

/// Caller-populated configuration, validated once at [`crate::StorageEngine::open`].
#[derive(Clone)]
pub struct StorageConfig {
    pub key_size: usize,
    pub data_size: usize,
    pub page_size: usize,
    pub buffer_size_in_blocks: usize,
    pub data_start_address: u64,
    pub data_end_address: u64,
    pub index_start_address: u64,
    pub index_end_address: u64,
    pub erase_size_in_pages: u32,
    pub parameters: Parameters,
    pub bitmap_size: usize,
    pub key_comparator: Arc<dyn KeyComparator>,
    pub data_comparator: Arc<dyn DataComparator>,
    pub bitmap_encoder: Option<Arc<dyn BitmapEncoder>>,
    pub search_strategy: SearchStrategy,
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn record_size(&self) -> usize {
        self.key_size + self.data_size
    }

    pub fn use_min_max(&self) -> bool {
        self.parameters.contains(Parameters::MAX_MIN)
    }

    pub fn use_bitmap(&self) -> bool {
        self.parameters.contains(Parameters::BMAP)
    }

    pub fn wants_index(&self) -> bool {
        self.parameters.contains(Parameters::INDEX)
    }

    /// Validates the configuration and returns the *effective* parameters
    /// after any downgrades described in the failure semantics (e.g. index
    /// disabled when too few buffer frames are configured).
    pub fn validate(&self) -> Result<Parameters> {
        if self.key_size == 0 {
            return Err(Error::ConfigInvalid("key_size must be non-zero".into()));
        }
        if self.data_size == 0 {
            return Err(Error::ConfigInvalid("data_size must be non-zero".into()));
        }
        if self.page_size == 0 {
            return Err(Error::ConfigInvalid("page_size must be non-zero".into()));
        }
        if self.erase_size_in_pages == 0 {
            return Err(Error::ConfigInvalid(
                "erase_size_in_pages must be non-zero".into(),
            ));
        }

        let mut parameters = self.parameters;

        if self.use_bitmap() {
            if !matches!(self.bitmap_size, 1 | 2 | 8) {
                return Err(Error::ConfigInvalid(
                    "bitmap_size must be 1, 2, or 8 bytes when BMAP is set".into(),
                ));
            }
            if self.bitmap_encoder.is_none() {
                return Err(Error::ConfigInvalid(
                    "BMAP is set but no bitmap_encoder was supplied".into(),
                ));
            }
        } else if self.bitmap_size != 0 {
            return Err(Error::ConfigInvalid(
                "bitmap_size must be 0 when BMAP is not set".into(),
            ));
        }

        if parameters.contains(Parameters::INDEX) && !self.use_bitmap() {
            return Err(Error::ConfigInvalid(
                "INDEX requires BMAP: index entries are per-page bitmaps".into(),
            ));
        }

        if parameters.contains(Parameters::INDEX) && self.buffer_size_in_blocks < 4 {
            log::warn!(
                "index requested but only {} < 4 buffer frames configured; \
                 continuing without secondary index",
                self.buffer_size_in_blocks
            );
            parameters = Parameters::from_bits(parameters.bits() & !Parameters::INDEX.bits());
        }

        if self.buffer_size_in_blocks < 2 {
            return Err(Error::ConfigInvalid(
                "buffer_size_in_blocks must be at least 2".into(),
            ));
        }

        let header_size = crate::page::data_header_size(self);
        if self.page_size <= header_size {
            return Err(Error::ConfigInvalid(format!(
                "page_size {} too small for header of {} bytes",
                self.page_size, header_size
            )));
        }
        let max_records = (self.page_size - header_size) / self.record_size();
        if max_records == 0 {
            return Err(Error::ConfigInvalid(
                "page_size leaves no room for a single record".into(),
            ));
        }

        if self.data_end_address <= self.data_start_address {
            return Err(Error::ConfigInvalid(
                "data_end_address must be greater than data_start_address".into(),
            ));
        }
        let data_pages =
            (self.data_end_address - self.data_start_address) / self.page_size as u64;
        if data_pages < 2 * self.erase_size_in_pages as u64 {
            return Err(Error::ConfigInvalid(format!(
                "data region holds {} pages, needs at least {}",
                data_pages,
                2 * self.erase_size_in_pages
            )));
        }

        if parameters.contains(Parameters::INDEX) {
            if self.index_end_address <= self.index_start_address {
                return Err(Error::ConfigInvalid(
                    "index_end_address must be greater than index_start_address".into(),
                ));
            }
            let idx_pages =
                (self.index_end_address - self.index_start_address) / self.page_size as u64;
            if idx_pages < 2 * self.erase_size_in_pages as u64 {
                return Err(Error::ConfigInvalid(format!(
                    "index region holds {} pages, needs at least {}",
                    idx_pages,
                    2 * self.erase_size_in_pages
                )));
            }
        }

        Ok(parameters)
    }
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("key_size", &self.key_size)
            .field("data_size", &self.data_size)
            .field("page_size", &self.page_size)
            .field("buffer_size_in_blocks", &self.buffer_size_in_blocks)
            .field("data_start_address", &self.data_start_address)
            .field("data_end_address", &self.data_end_address)
            .field("index_start_address", &self.index_start_address)
            .field("index_end_address", &self.index_end_address)
            .field("erase_size_in_pages", &self.erase_size_in_pages)
            .field("parameters", &self.parameters.bits())
            .field("bitmap_size", &self.bitmap_size)
            .field("search_strategy", &self.search_strategy)
            .field("data_dir", &self.data_dir)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::{U32KeyComparator, U32DataComparator};

    fn base_config() -> StorageConfig {
        StorageConfig {
            key_size: 4,
            data_size: 12,
            page_size: 512,
            buffer_size_in_blocks: 2,
            data_start_address: 0,
            data_end_address: 512 * 1000,
            index_start_address: 0,
            index_end_address: 0,
            erase_size_in_pages: 4,
            parameters: Parameters::MAX_MIN,
            bitmap_size: 0,
            key_comparator: Arc::new(U32KeyComparator),
            data_comparator: Arc::new(U32DataComparator),
            bitmap_encoder: None,
            search_strategy: SearchStrategy::Interpolated,
            data_dir: PathBuf::from("."),
        }
    }

    #[test]
    fn accepts_minimal_config() {
        let cfg = base_config();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_region_smaller_than_two_erase_blocks() {
        let mut cfg = base_config();
        cfg.data_end_address = cfg.data_start_address + cfg.page_size as u64 * 4;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn downgrades_index_with_too_few_buffers() {
        let mut cfg = base_config();
        cfg.parameters = Parameters::MAX_MIN | Parameters::BMAP | Parameters::INDEX;
        cfg.bitmap_size = 1;
        cfg.bitmap_encoder = Some(Arc::new(crate::bitmap::BucketBitmap::new(0, 255, 8)));
        cfg.buffer_size_in_blocks = 2;
        let effective = cfg.validate().unwrap();
        assert!(!effective.contains(Parameters::INDEX));
    }

    #[test]
    fn rejects_bmap_without_encoder() {
        let mut cfg = base_config();
        cfg.parameters = Parameters::MAX_MIN | Parameters::BMAP;
        cfg.bitmap_size = 1;
        assert!(cfg.validate().is_err());
    }
}
