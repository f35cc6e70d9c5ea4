//! Window Scheduler (§4.2): partitions a slice's compressed bytes into
//! fixed-size windows over a rotating buffer arena, keeps up to
//! `DOWNLOAD_SLICE_NUM` windows downloading concurrently, and rotates the
//! arena forward as the Block Walker consumes it.

use std::io;
use std::sync::Arc;

use crate::downloader::Downloader;
use crate::object_store::ObjectStore;

/// One full BGZF block's worth of headroom reserved at the head of the
/// arena so a block straddling the final window can be copied back and
/// re-read contiguously.
pub const HEADROOM: usize = 65_536;
/// Maximum bytes requested per window.
pub const MAX_SLICE_SIZE: u64 = 100_000_000;
/// Maximum number of windows (and background downloads) in flight.
pub const DOWNLOAD_SLICE_NUM: usize = 4;

/// One physical slot of the rotating buffer arena. A slot is reused across
/// logical windows once its previous contents are fully consumed.
struct Slot
{
    /// Fixed offset of this slot within the arena.
    offset: usize,
    /// Length of the download currently occupying this slot.
    requested_len: usize,
    downloader: Downloader,
}

/// Owns the rotating buffer arena and the downloaders that keep it filled.
pub struct WindowScheduler
{
    buffer: Vec<u8>,
    slots: Vec<Slot>,
    store: Arc<dyn ObjectStore>,
    bucket: String,
    key: String,
    start_compressed: u64,
    /// `headroom + (endCompressed - startCompressed)`, the source's
    /// `totalBytes`.
    total_bytes: u64,
    /// Running count of bytes requested so far, across all windows.
    requested_bytes: u64,
    /// Index of the slot currently being read from.
    slot_index: usize,
    /// Arena offset marking the start of the window currently being read.
    window_start: usize,
}

impl WindowScheduler
{
    /// `total_compressed = endCompressed - startCompressed`; the arena is
    /// sized `headroom + min(DOWNLOAD_SLICE_NUM * MAX_SLICE_SIZE,
    /// headroom + total_compressed)` per spec.md §4.2.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: String,
        key: String,
        start_compressed: u64,
        total_compressed: u64,
    ) -> io::Result<Self>
    {
        let total_bytes = HEADROOM as u64 + total_compressed;
        let arena_len = HEADROOM as u64 + total_bytes.min(DOWNLOAD_SLICE_NUM as u64 * MAX_SLICE_SIZE);
        let mut scheduler = WindowScheduler {
            buffer: vec![0u8; arena_len as usize],
            slots: Vec::with_capacity(DOWNLOAD_SLICE_NUM),
            store,
            bucket,
            key,
            start_compressed,
            total_bytes,
            requested_bytes: 0,
            slot_index: 0,
            window_start: HEADROOM,
        };

        let mut k = 0usize;
        loop
        {
            let offset = HEADROOM + k * MAX_SLICE_SIZE as usize;
            let mut slot = Slot { offset, requested_len: 0, downloader: Downloader::idle() };
            scheduler.launch(&mut slot);
            scheduler.slots.push(slot);
            k += 1;
            if scheduler.requested_bytes + HEADROOM as u64 >= scheduler.total_bytes
            {
                break;
            }
            if k >= DOWNLOAD_SLICE_NUM
            {
                break;
            }
        }
        log::info!(
            "Downloading {} bytes using {} concurrent windows.",
            scheduler.total_bytes,
            scheduler.slots.len()
        );

        scheduler.slots[0].downloader.join().and_then(|bytes| {
            scheduler.install(0, &bytes);
            Ok(())
        })?;
        Ok(scheduler)
    }

    fn bytes_to_request(&self) -> u64
    {
        MAX_SLICE_SIZE.min(self.total_bytes - self.requested_bytes)
    }

    fn launch(&mut self, slot: &mut Slot)
    {
        let n = self.bytes_to_request();
        if n == 0
        {
            return;
        }
        slot.requested_len = n as usize;
        slot.downloader.start(
            self.store.clone(),
            self.bucket.clone(),
            self.key.clone(),
            self.start_compressed + self.requested_bytes,
            n as usize,
        );
        self.requested_bytes += n;
    }

    fn install(&mut self, slot_index: usize, bytes: &[u8])
    {
        let offset = self.slots[slot_index].offset;
        self.buffer[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    pub fn buffer(&self) -> &[u8]
    {
        &self.buffer
    }

    /// Called whenever the Block Walker advances to a new block. Checks
    /// whether the read position is about to cross into the next window,
    /// prefetching/rotating as needed, and returns the (possibly shifted)
    /// block start offset: non-zero only when this call performed the
    /// "copy straddler back to head" rotation.
    pub fn rotate(&mut self, block_start: usize) -> io::Result<usize>
    {
        let next_window = self.window_start + self.slots[self.slot_index].requested_len;
        if next_window >= block_start + HEADROOM
        {
            return Ok(block_start);
        }

        if self.slot_index + 1 == self.slots.len()
        {
            let tail_len = next_window - block_start;
            let new_block_start = HEADROOM - tail_len;
            self.buffer.copy_within(block_start..block_start + tail_len, new_block_start);

            self.relaunch(self.slot_index);
            self.slot_index = 0;
            self.window_start = HEADROOM;
            let bytes = self.slots[0].downloader.join()?;
            self.install(0, &bytes);
            Ok(new_block_start)
        }
        else if next_window < block_start
        {
            self.relaunch(self.slot_index);
            self.window_start = next_window;
            self.slot_index += 1;
            Ok(block_start)
        }
        else
        {
            let bytes = self.slots[self.slot_index + 1].downloader.join()?;
            self.install(self.slot_index + 1, &bytes);
            Ok(block_start)
        }
    }

    /// Launch a new download reusing the physical slot at `idx`, for the
    /// next not-yet-requested logical window. Taking the slot out first
    /// works around borrowing `self.slots[idx]` mutably while `launch` also
    /// needs `&self.store`/`&self.bucket`/`&self.key`.
    fn relaunch(&mut self, idx: usize)
    {
        let mut slot = std::mem::replace(
            &mut self.slots[idx],
            Slot { offset: 0, requested_len: 0, downloader: Downloader::idle() },
        );
        self.launch(&mut slot);
        self.slots[idx] = slot;
    }
}
