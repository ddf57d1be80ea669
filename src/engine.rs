//! The engine proper: ties the allocator, page codec, buffer pool, and
//! block storage together into `put`/`get`/`scan`/`flush`.

use std::cmp::Ordering;

use log::{debug, info, warn};

use crate::allocator::CircularAllocator;
use crate::buffer::PageBufferPool;
use crate::config::{Parameters, SearchStrategy, StorageConfig};
use crate::error::{Error, Result};
use crate::iter::{RangeQuery, ScanIterator};
use crate::page::{max_index_records_per_page, DataPage, DataPageLayout, IndexPage};
use crate::stats::Stats;
use crate::storage::{BlockStorage, FileBlockStorage};

pub struct StorageEngine {
    config: StorageConfig,
    effective_parameters: Parameters,
    data_storage: Box<dyn BlockStorage>,
    index_storage: Option<Box<dyn BlockStorage>>,
    buffer: PageBufferPool,
    data_layout: DataPageLayout,
    data_alloc: CircularAllocator,
    index_alloc: Option<CircularAllocator>,
    min_key_numeric: Option<u64>,
    avg_key_diff: f64,
    stats: Stats,
}

impl StorageEngine {
    /// The `init` entry point: opens `datafile.bin` and, if indexing
    /// is requested and survives validation, `idxfile.bin`, both under
    /// `config.data_dir`. Existing files are reused verbatim but their
    /// contents are not re-scanned — recovery of a non-empty store is an
    /// open question this crate does not implement (see DESIGN.md).
    pub fn open(config: StorageConfig) -> Result<Self> {
        let effective_parameters = config.validate()?;
        std::fs::create_dir_all(&config.data_dir)?;

        let data_layout = DataPageLayout::new(&config);
        let data_region_pages =
            (config.data_end_address - config.data_start_address) / config.page_size as u64;
        let data_alloc = CircularAllocator::new(0, data_region_pages, config.erase_size_in_pages);
        let data_storage: Box<dyn BlockStorage> =
            Box::new(FileBlockStorage::open(data_file_path(&config))?);

        let with_index = effective_parameters.contains(Parameters::INDEX);
        let (index_storage, index_alloc) = if with_index {
            let idx_region_pages =
                (config.index_end_address - config.index_start_address) / config.page_size as u64;
            let storage: Box<dyn BlockStorage> =
                Box::new(FileBlockStorage::open(index_file_path(&config))?);
            (
                Some(storage),
                Some(CircularAllocator::new(
                    0,
                    idx_region_pages,
                    config.erase_size_in_pages,
                )),
            )
        } else {
            (None, None)
        };

        let mut buffer = PageBufferPool::new(config.page_size, with_index);
        DataPage::init(&mut buffer.write_frame, data_layout);
        if let Some(idx_frame) = buffer.index_write_frame.as_mut() {
            IndexPage::init(idx_frame, config.bitmap_size);
        }

        info!(
            "sbits engine opened at {:?}: {} data pages ({} per erase block), index {}",
            config.data_dir, data_region_pages, config.erase_size_in_pages, with_index
        );

        Ok(Self {
            config,
            effective_parameters,
            data_storage,
            index_storage,
            buffer,
            data_layout,
            data_alloc,
            index_alloc,
            min_key_numeric: None,
            avg_key_diff: 1.0,
            stats: Stats::default(),
        })
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    /// Convenience wrapper over `Stats`'s `Display` impl, logged at
    /// `info` level rather than printed directly so it composes with
    /// whatever subscriber the caller installed.
    pub fn print_stats(&self) {
        info!("{}", self.stats);
    }

    pub fn parameters(&self) -> Parameters {
        self.effective_parameters
    }

    pub(crate) fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub(crate) fn data_alloc_ref(&self) -> &CircularAllocator {
        &self.data_alloc
    }

    pub(crate) fn index_alloc_ref(&self) -> Option<&CircularAllocator> {
        self.index_alloc.as_ref()
    }

    pub(crate) fn data_layout_ref(&self) -> &DataPageLayout {
        &self.data_layout
    }

    pub(crate) fn buffer_ref(&self) -> &PageBufferPool {
        &self.buffer
    }

    fn data_page_offset(&self, physical: u64) -> u64 {
        self.config.data_start_address + physical * self.config.page_size as u64
    }

    fn index_page_offset(&self, physical: u64) -> u64 {
        self.config.index_start_address + physical * self.config.page_size as u64
    }

    pub(crate) fn load_data_page(&mut self, logical_id: u32) -> Result<()> {
        if self.buffer.data_read_frame_holds(logical_id) {
            self.stats.buffer_hits += 1;
            return Ok(());
        }
        let physical = self.data_alloc.logical_to_physical(logical_id).ok_or(
            Error::PageCorrupt {
                logical_page_id: logical_id,
                reason: "logical data page is not live",
            },
        )?;
        let offset = self.data_page_offset(physical);
        self.data_storage.read_page(offset, &mut self.buffer.read_frame)?;
        self.stats.data_page_reads += 1;
        self.buffer.note_data_read_frame_loaded(logical_id);
        Ok(())
    }

    pub(crate) fn load_index_page(&mut self, logical_idx_id: u32) -> Result<()> {
        if self.buffer.index_read_frame_holds(logical_idx_id) {
            self.stats.buffer_hits += 1;
            return Ok(());
        }
        let index_alloc = self.index_alloc.as_ref().expect("index enabled");
        let physical = index_alloc.logical_to_physical(logical_idx_id).ok_or(
            Error::PageCorrupt {
                logical_page_id: logical_idx_id,
                reason: "logical index page is not live",
            },
        )?;
        let offset = self.index_page_offset(physical);
        let frame = self
            .buffer
            .index_read_frame
            .as_mut()
            .expect("index enabled");
        self.index_storage
            .as_ref()
            .expect("index enabled")
            .read_page(offset, frame)?;
        self.stats.index_page_reads += 1;
        self.buffer.note_index_read_frame_loaded(logical_idx_id);
        Ok(())
    }

    /// Appends one record. `key` must be ≥ the last-inserted key; this is
    /// not enforced, and inserting out of order is undefined behavior.
    pub fn put(&mut self, key: &[u8], data: &[u8]) -> Result<()> {
        debug_assert_eq!(key.len(), self.config.key_size);
        debug_assert_eq!(data.len(), self.config.data_size);

        if self.min_key_numeric.is_none() {
            self.min_key_numeric = Some(self.config.key_comparator.to_u64(key));
        }

        if self.data_layout.count_of(&self.buffer.write_frame) as usize == self.data_layout.max_records
        {
            self.seal_data_page()?;
        }

        let mut page = DataPage::from_existing(&mut self.buffer.write_frame, self.data_layout);
        let first_in_page = page.count() == 0;
        if self.config.use_min_max() {
            if first_in_page {
                page.set_min_key(key);
                page.set_max_key(key);
                page.set_min_data(data);
                page.set_max_data(data);
            } else {
                page.set_max_key(key);
                if self.config.data_comparator.compare(data, page.min_data()) == Ordering::Less {
                    page.set_min_data(data);
                }
                if self.config.data_comparator.compare(data, page.max_data()) == Ordering::Greater {
                    page.set_max_data(data);
                }
            }
        }
        if let Some(encoder) = &self.config.bitmap_encoder {
            encoder.update(data, page.bitmap_mut());
        }
        page.push_record(key, data);
        Ok(())
    }

    /// Writes the current write-buffer frame (full or partial) through the
    /// allocator, emits its secondary-index entry if indexing, and
    /// reinitializes the frame. Shared by `put`'s internal full-page flush
    /// and the public `flush`'s partial-page flush.
    fn seal_data_page(&mut self) -> Result<()> {
        let max_key_of_flushed = if self.config.use_min_max() {
            let page = DataPage::from_existing(&mut self.buffer.write_frame, self.data_layout);
            Some(page.max_key().to_vec())
        } else {
            None
        };

        let alloc = self.data_alloc.allocate_next();
        if alloc.event.reclaimed || alloc.event.wrapped {
            debug!(
                "data: {} (first_logical_id={}, min_key floor bumped)",
                if alloc.event.wrapped { "wrapped" } else { "reclaimed oldest block" },
                self.data_alloc.first_logical_id(),
            );
            self.bump_min_key_on_reclaim();
        }

        {
            let mut page = DataPage::from_existing(&mut self.buffer.write_frame, self.data_layout);
            page.set_logical_page_id(alloc.logical_id);
        }

        let offset = self.data_page_offset(alloc.physical);
        self.data_storage.write_page(offset, &self.buffer.write_frame)?;
        self.stats.data_page_writes += 1;
        self.buffer.invalidate_data_read_frame();

        if self.effective_parameters.contains(Parameters::INDEX) {
            self.append_index_entry(alloc.logical_id)?;
        }

        if let Some(max_key) = max_key_of_flushed {
            self.recompute_avg_key_diff(&max_key);
        }

        DataPage::init(&mut self.buffer.write_frame, self.data_layout);
        Ok(())
    }

    fn bump_min_key_on_reclaim(&mut self) {
        if let Some(min_key) = self.min_key_numeric {
            let bump = self.config.erase_size_in_pages as f64
                * self.avg_key_diff
                * self.data_layout.max_records as f64;
            self.min_key_numeric = Some(min_key + bump.round() as u64);
        }
    }

    fn recompute_avg_key_diff(&mut self, max_key_of_flushed: &[u8]) {
        let max_key_num = self.config.key_comparator.to_u64(max_key_of_flushed);
        let min_key_num = self.min_key_numeric.unwrap_or(0);
        let num_live_blocks = self.data_alloc.live_page_count().max(1) as f64;
        let denom = num_live_blocks * (self.data_layout.max_records.max(2) - 1) as f64;
        let diff = if denom > 0.0 {
            max_key_num.saturating_sub(min_key_num) as f64 / denom
        } else {
            1.0
        };
        self.avg_key_diff = diff.max(1.0);
    }

    fn append_index_entry(&mut self, data_logical_id: u32) -> Result<()> {
        let bitmap = {
            let page = DataPage::from_existing(&mut self.buffer.write_frame, self.data_layout);
            page.bitmap().to_vec()
        };
        let bitmap_size = self.config.bitmap_size;
        let max_idx_records = max_index_records_per_page(&self.config);

        let full = {
            let frame = self.buffer.index_write_frame.as_mut().expect("index enabled");
            let page = IndexPage::from_existing(frame, bitmap_size);
            page.count() as usize >= max_idx_records
        };
        if full {
            self.seal_index_page()?;
        }

        let frame = self.buffer.index_write_frame.as_mut().expect("index enabled");
        let mut page = IndexPage::from_existing(frame, bitmap_size);
        if page.count() == 0 {
            page.set_min_data_page_id_covered(data_logical_id);
        }
        page.push_entry(&bitmap);
        Ok(())
    }

    fn seal_index_page(&mut self) -> Result<()> {
        let alloc = self
            .index_alloc
            .as_mut()
            .expect("index enabled")
            .allocate_next();
        if alloc.event.reclaimed || alloc.event.wrapped {
            debug!(
                "index: {} (first_logical_id={})",
                if alloc.event.wrapped { "wrapped" } else { "reclaimed oldest block" },
                self.index_alloc.as_ref().unwrap().first_logical_id(),
            );
        }

        {
            let frame = self.buffer.index_write_frame.as_mut().expect("index enabled");
            let mut page = IndexPage::from_existing(frame, self.config.bitmap_size);
            page.set_logical_idx_id(alloc.logical_id);
        }

        let offset = self.index_page_offset(alloc.physical);
        let frame = self.buffer.index_write_frame.as_ref().expect("index enabled");
        self.index_storage
            .as_mut()
            .expect("index enabled")
            .write_page(offset, frame)?;
        self.stats.index_page_writes += 1;
        self.buffer.invalidate_index_read_frame();

        let frame = self.buffer.index_write_frame.as_mut().expect("index enabled");
        IndexPage::init(frame, self.config.bitmap_size);
        Ok(())
    }

    /// Writes back whatever the write buffer currently holds. A no-op when
    /// the buffer is empty, so calling `flush` with nothing pending never
    /// allocates an empty page.
    pub fn flush(&mut self) -> Result<()> {
        if self.data_layout.count_of(&self.buffer.write_frame) == 0 {
            return Ok(());
        }
        self.seal_data_page()?;
        self.data_storage.sync()?;
        if let Some(storage) = self.index_storage.as_mut() {
            storage.sync()?;
        }
        Ok(())
    }

    fn binary_search_records(&self, buf: &[u8], key: &[u8], count: usize) -> Option<usize> {
        if count == 0 {
            return None;
        }
        let mut lo = 0usize;
        let mut hi = count;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let (k, _) = self.data_layout.record_at_of(buf, mid);
            match self.config.key_comparator.compare(k, key) {
                Ordering::Equal => return Some(mid),
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
            }
        }
        None
    }

    /// Point lookup. Checks the unflushed write buffer first, so a `get`
    /// immediately after `put` sees its own write (see DESIGN.md), then
    /// locates the enclosing flushed page via interpolated or binary search.
    pub fn get(&mut self, key: &[u8], out: &mut [u8]) -> Result<bool> {
        debug_assert_eq!(out.len(), self.config.data_size);

        let buffered_count = self.data_layout.count_of(&self.buffer.write_frame) as usize;
        if buffered_count > 0 {
            if let Some(idx) = self.binary_search_records(&self.buffer.write_frame, key, buffered_count)
            {
                let (_, data) = self.data_layout.record_at_of(&self.buffer.write_frame, idx);
                out.copy_from_slice(data);
                return Ok(true);
            }
        }

        if self.data_alloc.next_logical_id() == self.data_alloc.first_logical_id() {
            return Ok(false);
        }

        let Some(page_id) = self.locate_page(key)? else {
            return Ok(false);
        };
        self.load_data_page(page_id)?;
        let count = self.data_layout.count_of(&self.buffer.read_frame) as usize;
        match self.binary_search_records(&self.buffer.read_frame, key, count) {
            Some(idx) => {
                let (_, data) = self.data_layout.record_at_of(&self.buffer.read_frame, idx);
                out.copy_from_slice(data);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn locate_page(&mut self, key: &[u8]) -> Result<Option<u32>> {
        let first = self.data_alloc.first_logical_id();
        let next = self.data_alloc.next_logical_id();
        if next == first {
            return Ok(None);
        }
        let live_last = next - 1;
        match self.config.search_strategy {
            SearchStrategy::BinaryOnly => self.locate_page_binary(key, first, live_last),
            SearchStrategy::Interpolated => self.locate_page_interpolated(key, first, live_last),
        }
    }

    fn locate_page_binary(&mut self, key: &[u8], first: u32, live_last: u32) -> Result<Option<u32>> {
        let mut lo = first as i64;
        let mut hi = live_last as i64;
        while lo <= hi {
            let mid = lo + (hi - lo) / 2;
            let pid = mid as u32;
            self.load_data_page(pid)?;
            let min_key = self.data_layout.min_key_of(&self.buffer.read_frame).to_vec();
            let max_key = self.data_layout.max_key_of(&self.buffer.read_frame).to_vec();
            if self.config.key_comparator.compare(key, &min_key) == Ordering::Less {
                hi = mid - 1;
            } else if self.config.key_comparator.compare(key, &max_key) == Ordering::Greater {
                lo = mid + 1;
            } else {
                return Ok(Some(pid));
            }
        }
        Ok(None)
    }

    /// Self-correcting interpolated search: estimates a page id from
    /// `avg_key_diff`, then nudges the estimate using each visited page's
    /// min/max key until the estimate's envelope collapses to one page.
    fn locate_page_interpolated(
        &mut self,
        key: &[u8],
        first: u32,
        live_last: u32,
    ) -> Result<Option<u32>> {
        let key_num = self.config.key_comparator.to_u64(key);
        let min_key_num = self.min_key_numeric.unwrap_or(key_num);
        let step = (self.data_layout.max_records.max(1) as f64 * self.avg_key_diff).max(1.0);

        let mut page_id: i64 = if key_num < min_key_num {
            first as i64
        } else {
            first as i64 + ((key_num - min_key_num) as f64 / step) as i64
        };

        let mut lo = first as i64;
        let mut hi = live_last as i64;
        page_id = page_id.clamp(lo, hi);

        loop {
            if lo > hi {
                return Ok(None);
            }
            let pid = page_id.clamp(lo, hi) as u32;
            self.load_data_page(pid)?;

            if lo >= hi {
                return Ok(Some(pid));
            }

            let min_key = self.data_layout.min_key_of(&self.buffer.read_frame).to_vec();
            let max_key = self.data_layout.max_key_of(&self.buffer.read_frame).to_vec();

            if self.config.key_comparator.compare(key, &min_key) == Ordering::Less {
                hi = pid as i64 - 1;
                let min_key_num_here = self.config.key_comparator.to_u64(&min_key);
                let off = ((key_num as i64 - min_key_num_here as i64) as f64 / step) as i64 - 1;
                page_id = (pid as i64 + off).max(lo);
            } else if self.config.key_comparator.compare(key, &max_key) == Ordering::Greater {
                lo = pid as i64 + 1;
                let max_key_num_here = self.config.key_comparator.to_u64(&max_key);
                let off = ((key_num as i64 - max_key_num_here as i64) as f64 / step) as i64 + 1;
                page_id = (pid as i64 + off).min(hi);
            } else {
                return Ok(Some(pid));
            }
        }
    }

    pub fn scan(&mut self, query: RangeQuery) -> ScanIterator<'_> {
        ScanIterator::new(self, query)
    }
}

impl Drop for StorageEngine {
    /// `flush` must be invoked before destruction; this only closes file
    /// handles (implicitly, via field drop) and warns if the caller left
    /// unflushed records, rather than performing I/O that could fail
    /// silently inside `Drop`.
    fn drop(&mut self) {
        if self.data_layout.count_of(&self.buffer.write_frame) > 0 {
            warn!(
                "StorageEngine dropped with unflushed records in the write buffer; \
                 call flush() before drop to persist them"
            );
        }
    }
}

fn data_file_path(config: &StorageConfig) -> std::path::PathBuf {
    config.data_dir.join("datafile.bin")
}

fn index_file_path(config: &StorageConfig) -> std::path::PathBuf {
    config.data_dir.join("idxfile.bin")
}
