//! Range-scan iterator: fuses an optional key-range filter with an
//! optional data-range filter, pruning pages via the secondary bitmap index
//! when one is configured.

use std::cmp::Ordering;

use crate::bitmap::{overlaps, range_query_bitmap};
use crate::config::Parameters;
use crate::engine::StorageEngine;
use crate::error::Result;
use crate::page;

/// The four optional scan bounds. Any combination may be absent.
#[derive(Debug, Clone, Default)]
pub struct RangeQuery {
    pub min_key: Option<Vec<u8>>,
    pub max_key: Option<Vec<u8>>,
    pub min_data: Option<Vec<u8>>,
    pub max_data: Option<Vec<u8>>,
}

impl RangeQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key_range(mut self, min_key: Option<Vec<u8>>, max_key: Option<Vec<u8>>) -> Self {
        self.min_key = min_key;
        self.max_key = max_key;
        self
    }

    pub fn with_data_range(mut self, min_data: Option<Vec<u8>>, max_data: Option<Vec<u8>>) -> Self {
        self.min_data = min_data;
        self.max_data = max_data;
        self
    }
}

/// Yields owned `(key, data)` pairs: each `next()` may load a different
/// page into the engine's shared read frame, so a borrow into that frame
/// could not outlive the following call.
pub struct ScanIterator<'engine> {
    engine: &'engine mut StorageEngine,
    query: RangeQuery,
    query_bitmap: Option<Vec<u8>>,
    use_index: bool,

    seq_next_id: u32,
    seq_end_id: u32,

    idx_next_id: u32,
    idx_end_id: u32,
    idx_page_loaded: bool,
    idx_entry_pos: usize,
    idx_page_entry_count: usize,
    idx_page_min_data_id: u32,

    current_data_logical_id: Option<u32>,
    record_pos: usize,
    terminated: bool,
}

impl<'engine> ScanIterator<'engine> {
    pub(crate) fn new(engine: &'engine mut StorageEngine, query: RangeQuery) -> Self {
        let use_bitmap =
            engine.config().use_bitmap() && (query.min_data.is_some() || query.max_data.is_some());
        let query_bitmap = if use_bitmap {
            let encoder = engine
                .config()
                .bitmap_encoder
                .as_deref()
                .expect("BMAP requires a bitmap_encoder");
            Some(range_query_bitmap(
                encoder,
                query.min_data.as_deref(),
                query.max_data.as_deref(),
            ))
        } else {
            None
        };

        let use_index = query_bitmap.is_some() && engine.parameters().contains(Parameters::INDEX);

        let (seq_next_id, seq_end_id) = (
            engine.data_alloc_ref().first_logical_id(),
            engine.data_alloc_ref().next_logical_id(),
        );
        let (idx_next_id, idx_end_id) = if use_index {
            let idx_alloc = engine.index_alloc_ref().expect("index enabled");
            (idx_alloc.first_logical_id(), idx_alloc.next_logical_id())
        } else {
            (0, 0)
        };

        Self {
            engine,
            query,
            query_bitmap,
            use_index,
            seq_next_id,
            seq_end_id,
            idx_next_id,
            idx_end_id,
            idx_page_loaded: false,
            idx_entry_pos: 0,
            idx_page_entry_count: 0,
            idx_page_min_data_id: 0,
            current_data_logical_id: None,
            record_pos: 0,
            terminated: false,
        }
    }

    fn key_passes_lower(&self, key: &[u8]) -> bool {
        match &self.query.min_key {
            Some(mk) => self.engine.config().key_comparator.compare(key, mk) != Ordering::Less,
            None => true,
        }
    }

    fn key_exceeds_upper(&self, key: &[u8]) -> bool {
        match &self.query.max_key {
            Some(mk) => self.engine.config().key_comparator.compare(key, mk) == Ordering::Greater,
            None => false,
        }
    }

    fn data_in_range(&self, data: &[u8]) -> bool {
        if let Some(min) = &self.query.min_data {
            if self.engine.config().data_comparator.compare(data, min) == Ordering::Less {
                return false;
            }
        }
        if let Some(max) = &self.query.max_data {
            if self.engine.config().data_comparator.compare(data, max) == Ordering::Greater {
                return false;
            }
        }
        true
    }

    /// Pulls the next candidate data page's logical id, driving scanning
    /// from the secondary index when one applies, else sequentially.
    /// Already loads the winning page into the engine's data-read frame.
    fn advance_to_next_candidate_page(&mut self) -> Result<Option<u32>> {
        loop {
            let candidate = if self.use_index {
                self.next_index_candidate()?
            } else {
                self.next_sequential_candidate()
            };
            let Some(candidate) = candidate else {
                return Ok(None);
            };

            if self.engine.data_alloc_ref().logical_to_physical(candidate).is_none() {
                continue;
            }
            self.engine.load_data_page(candidate)?;

            if !self.use_index {
                // The index path already filtered on the query bitmap while
                // selecting `candidate`; sequential scanning has to check
                // the page-level predicate itself.
                let bitmap = self
                    .engine
                    .data_layout_ref()
                    .bitmap_of(&self.engine.buffer_ref().read_frame)
                    .to_vec();
                if !self.page_passes_bitmap(&bitmap) {
                    continue;
                }
            }

            return Ok(Some(candidate));
        }
    }

    fn page_passes_bitmap(&self, page_bitmap: &[u8]) -> bool {
        match &self.query_bitmap {
            Some(qb) => overlaps(qb, page_bitmap),
            None => true,
        }
    }

    fn next_sequential_candidate(&mut self) -> Option<u32> {
        if self.seq_next_id >= self.seq_end_id {
            return None;
        }
        let id = self.seq_next_id;
        self.seq_next_id += 1;
        Some(id)
    }

    fn next_index_candidate(&mut self) -> Result<Option<u32>> {
        loop {
            if !self.idx_page_loaded {
                if self.idx_next_id >= self.idx_end_id {
                    return Ok(None);
                }
                self.engine.load_index_page(self.idx_next_id)?;
                self.idx_next_id += 1;
                let idx_frame = &self.engine.buffer_ref().index_read_frame;
                let idx_frame = idx_frame.as_ref().expect("index enabled");
                self.idx_page_min_data_id = page::index_min_data_page_id_covered_of(idx_frame);
                self.idx_page_entry_count = page::index_count_of(idx_frame) as usize;
                self.idx_entry_pos = 0;
                self.idx_page_loaded = true;
                continue;
            }

            if self.idx_entry_pos >= self.idx_page_entry_count {
                self.idx_page_loaded = false;
                continue;
            }

            let bitmap_size = self.engine.config().bitmap_size;
            let entry_pos = self.idx_entry_pos;
            self.idx_entry_pos += 1;
            let data_logical_id = self.idx_page_min_data_id + entry_pos as u32;

            let idx_frame = &self.engine.buffer_ref().index_read_frame;
            let idx_frame = idx_frame.as_ref().expect("index enabled");
            let entry = page::index_entry_of(idx_frame, bitmap_size, entry_pos);
            let overlaps_query = match &self.query_bitmap {
                Some(qb) => overlaps(qb, entry),
                None => true,
            };
            if !overlaps_query {
                continue;
            }
            return Ok(Some(data_logical_id));
        }
    }
}

impl<'engine> Iterator for ScanIterator<'engine> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.terminated {
                return None;
            }

            if self.current_data_logical_id.is_none() {
                match self.advance_to_next_candidate_page() {
                    Ok(Some(id)) => {
                        self.current_data_logical_id = Some(id);
                        self.record_pos = 0;
                    }
                    Ok(None) => {
                        self.terminated = true;
                        return None;
                    }
                    Err(e) => {
                        self.terminated = true;
                        return Some(Err(e));
                    }
                }
            }

            let count = self
                .engine
                .data_layout_ref()
                .count_of(&self.engine.buffer_ref().read_frame) as usize;
            if self.record_pos >= count {
                self.current_data_logical_id = None;
                continue;
            }

            let (key, data) = {
                let layout = self.engine.data_layout_ref();
                let buf = &self.engine.buffer_ref().read_frame;
                let (k, d) = layout.record_at_of(buf, self.record_pos);
                (k.to_vec(), d.to_vec())
            };
            self.record_pos += 1;

            if !self.key_passes_lower(&key) {
                continue;
            }
            if self.key_exceeds_upper(&key) {
                self.terminated = true;
                return None;
            }
            if !self.data_in_range(&data) {
                continue;
            }
            return Some(Ok((key, data)));
        }
    }
}
