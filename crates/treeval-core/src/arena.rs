//! Arena & allocator façade.
//!
//! Two flavors share one implementation: a plain append-only bump region
//! (`Arena::linear`), and one that additionally maintains a content-addressed
//! index so identical `(align, bytes)` payloads are returned from the same
//! address (`Arena::deduplicating`). Scoped "tags" (`tag_acquire` /
//! `tag_release` / `reset`) are implemented as a stack of independent
//! `bumpalo::Bump` regions: acquiring a tag pushes a fresh region, releasing
//! it drops every region pushed since, which also purges any dedup index
//! entries that pointed into the reclaimed memory.

use std::collections::HashMap;
use std::sync::Mutex;

use bumpalo::Bump;

use crate::error::BuildError;
use crate::value::MIN_PAYLOAD_ALIGN;

/// Opaque marker returned by [`Arena::tag_acquire`]; pass back to
/// [`Arena::tag_release`] to bulk-reclaim everything allocated since.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tag(usize);

struct Region {
    bump: Bump,
    ranges: Vec<(usize, usize)>,
}

impl Region {
    fn new() -> Self {
        Region {
            bump: Bump::new(),
            ranges: Vec::new(),
        }
    }

    fn owns(&self, addr: usize) -> bool {
        self.ranges.iter().any(|&(s, e)| addr >= s && addr < e)
    }
}

#[derive(Default)]
struct DedupIndex {
    map: HashMap<(usize, Vec<u8>), usize>,
}

pub struct Arena {
    dedup_enabled: bool,
    regions: Mutex<Vec<Region>>,
    dedup: Mutex<DedupIndex>,
}

impl Arena {
    /// An append-only arena with no content-addressed lookup: `lookup`
    /// always returns `None`.
    pub fn linear() -> Self {
        Self::new(false)
    }

    /// An append-only arena that also deduplicates: storing identical
    /// `(align, bytes)` content returns the existing pointer.
    pub fn deduplicating() -> Self {
        Self::new(true)
    }

    fn new(dedup_enabled: bool) -> Self {
        Arena {
            dedup_enabled,
            regions: Mutex::new(vec![Region::new()]),
            dedup: Mutex::new(DedupIndex::default()),
        }
    }

    pub fn is_dedup_enabled(&self) -> bool {
        self.dedup_enabled
    }

    /// Returns an existing pointer for identical content if dedup is
    /// enabled; otherwise always `None`.
    pub fn lookup(&self, bytes: &[u8], align: usize) -> Option<*const u8> {
        if !self.dedup_enabled {
            return None;
        }
        let align = align.max(MIN_PAYLOAD_ALIGN);
        let key = (align, bytes.to_vec());
        self.dedup
            .lock().unwrap()
            .map
            .get(&key)
            .map(|&addr| addr as *const u8)
    }

    /// Stores a single contiguous payload, returning its address.
    pub fn store(&self, bytes: &[u8], align: usize) -> Result<*const u8, BuildError> {
        self.storev(&[bytes], align)
    }

    /// Gather-stores several buffers into one contiguous allocation.
    pub fn storev(&self, iov: &[&[u8]], align: usize) -> Result<*const u8, BuildError> {
        let align = align.max(MIN_PAYLOAD_ALIGN);
        let mut total_len: usize = 0;
        for s in iov {
            total_len = total_len
                .checked_add(s.len())
                .ok_or(BuildError::SizeOverflow)?;
        }

        let mut concatenated = None;
        if self.dedup_enabled {
            let mut buf = Vec::with_capacity(total_len);
            for s in iov {
                buf.extend_from_slice(s);
            }
            let key = (align, buf);
            if let Some(&addr) = self.dedup.lock().unwrap().map.get(&key) {
                return Ok(addr as *const u8);
            }
            concatenated = Some(key);
        }

        let layout = std::alloc::Layout::from_size_align(total_len.max(1), align)
            .map_err(|_| BuildError::SizeOverflow)?;

        let mut regions = self.regions.lock().unwrap();
        let region = regions.last_mut().expect("arena always has a region");
        let dst = region.bump.alloc_layout(layout);
        let ptr = dst.as_ptr();
        // SAFETY: `dst` was just allocated with `total_len` capacity and is
        // exclusively owned by this call; the source slices are disjoint
        // from it and from each other.
        unsafe {
            let mut offset = 0usize;
            for s in iov {
                std::ptr::copy_nonoverlapping(s.as_ptr(), ptr.add(offset), s.len());
                offset += s.len();
            }
        }
        let start = ptr as usize;
        region.ranges.push((start, start + total_len.max(1)));

        if let Some((align, buf)) = concatenated {
            self.dedup.lock().unwrap().map.insert((align, buf), start);
        }

        Ok(ptr as *const u8)
    }

    /// Strict membership test: does any live region own this address?
    pub fn contains(&self, ptr: *const u8) -> bool {
        let addr = ptr as usize;
        self.regions.lock().unwrap().iter().any(|r| r.owns(addr))
    }

    /// Opens a new scoped sub-region for bulk reclaim.
    pub fn tag_acquire(&self) -> Tag {
        let mut regions = self.regions.lock().unwrap();
        regions.push(Region::new());
        Tag(regions.len() - 1)
    }

    /// Reclaims everything allocated since the matching `tag_acquire`,
    /// including purging dedup-index entries that pointed into it.
    pub fn tag_release(&self, tag: Tag) {
        let mut regions = self.regions.lock().unwrap();
        if tag.0 == 0 || tag.0 >= regions.len() {
            return;
        }
        let released = regions.split_off(tag.0);
        drop(regions);

        if self.dedup_enabled {
            let mut dedup = self.dedup.lock().unwrap();
            dedup
                .map
                .retain(|_, addr| !released.iter().any(|r| r.owns(*addr)));
        }
    }

    /// Discards everything in every region, back to a single empty one.
    pub fn reset(&self) {
        *self.regions.lock().unwrap() = vec![Region::new()];
        self.dedup.lock().unwrap().map.clear();
    }
}
