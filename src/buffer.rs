//! Fixed page-frame pool: two frames when the secondary index is disabled
//! (data-write, data-read), four when it is enabled
//! (adds index-write, index-read). Frame 1 (data-read) doubles as a
//! one-entry cache keyed by logical page id, so repeated reads of the same
//! page avoid a storage round trip (`buffer_hits` in [`crate::stats::Stats`]).

pub struct PageBufferPool {
    pub write_frame: Vec<u8>,
    pub read_frame: Vec<u8>,
    pub index_write_frame: Option<Vec<u8>>,
    pub index_read_frame: Option<Vec<u8>>,
    read_frame_logical_id: Option<u32>,
    index_read_frame_logical_id: Option<u32>,
}

impl PageBufferPool {
    pub fn new(page_size: usize, with_index: bool) -> Self {
        Self {
            write_frame: vec![0u8; page_size],
            read_frame: vec![0u8; page_size],
            index_write_frame: with_index.then(|| vec![0u8; page_size]),
            index_read_frame: with_index.then(|| vec![0u8; page_size]),
            read_frame_logical_id: None,
            index_read_frame_logical_id: None,
        }
    }

    /// Returns `true` if `logical_page_id` is already resident in the
    /// data-read frame, so the caller can skip the storage read entirely.
    pub fn data_read_frame_holds(&self, logical_page_id: u32) -> bool {
        self.read_frame_logical_id == Some(logical_page_id)
    }

    pub fn note_data_read_frame_loaded(&mut self, logical_page_id: u32) {
        self.read_frame_logical_id = Some(logical_page_id);
    }

    pub fn invalidate_data_read_frame(&mut self) {
        self.read_frame_logical_id = None;
    }

    pub fn index_read_frame_holds(&self, logical_idx_id: u32) -> bool {
        self.index_read_frame_logical_id == Some(logical_idx_id)
    }

    pub fn note_index_read_frame_loaded(&mut self, logical_idx_id: u32) {
        self.index_read_frame_logical_id = Some(logical_idx_id);
    }

    pub fn invalidate_index_read_frame(&mut self) {
        self.index_read_frame_logical_id = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_frames_when_index_disabled() {
        let pool = PageBufferPool::new(128, false);
        assert!(pool.index_write_frame.is_none());
        assert!(pool.index_read_frame.is_none());
    }

    #[test]
    fn four_frames_when_index_enabled() {
        let pool = PageBufferPool::new(128, true);
        assert!(pool.index_write_frame.is_some());
        assert!(pool.index_read_frame.is_some());
    }

    #[test]
    fn tracks_data_read_frame_residency() {
        let mut pool = PageBufferPool::new(128, false);
        assert!(!pool.data_read_frame_holds(3));
        pool.note_data_read_frame_loaded(3);
        assert!(pool.data_read_frame_holds(3));
        assert!(!pool.data_read_frame_holds(4));
        pool.invalidate_data_read_frame();
        assert!(!pool.data_read_frame_holds(3));
    }
}
