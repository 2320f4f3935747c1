//! Byte-level layouts for out-of-line payloads.
//!
//! Every function here is `unsafe`: it trusts that the pointer it is given
//! addresses a payload of the matching shape, still owned by a live arena.
//! [`crate::builder::Builder`] is the only code that should call these
//! directly, after routing through [`crate::arena::Arena::contains`].

use crate::value::V;

const WORD: usize = std::mem::size_of::<u64>();

#[inline]
unsafe fn read_u64(ptr: *const u8) -> u64 {
    unsafe { u64::from_le_bytes(std::slice::from_raw_parts(ptr, WORD).try_into().unwrap()) }
}

fn u64_bytes(v: u64) -> [u8; 8] {
    v.to_le_bytes()
}

// ---------------------------------------------------------------------
// Out-of-line integer: { flag: u64 (0=signed,1=unsigned), bits: u64 }
// ---------------------------------------------------------------------

pub(crate) fn encode_out_int(signed: i64, is_unsigned: bool) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[0..8].copy_from_slice(&u64_bytes(is_unsigned as u64));
    out[8..16].copy_from_slice(&u64_bytes(signed as u64));
    out
}

pub(crate) unsafe fn read_out_int(ptr: *const u8) -> (bool, u64) {
    unsafe {
        let is_unsigned = read_u64(ptr) != 0;
        let bits = read_u64(ptr.add(WORD));
        (is_unsigned, bits)
    }
}

// ---------------------------------------------------------------------
// Out-of-line float: { bits: u64 }  (an IEEE-754 double)
// ---------------------------------------------------------------------

pub(crate) fn encode_out_float(f: f64) -> [u8; 8] {
    u64_bytes(f.to_bits())
}

pub(crate) unsafe fn read_out_float(ptr: *const u8) -> f64 {
    unsafe { f64::from_bits(read_u64(ptr)) }
}

// ---------------------------------------------------------------------
// Out-of-line string: varint(len) ++ bytes ++ 0x00
// ---------------------------------------------------------------------

pub(crate) fn encode_varint(mut n: u64, out: &mut Vec<u8>) {
    loop {
        let mut byte = (n & 0x7f) as u8;
        n >>= 7;
        if n != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if n == 0 {
            break;
        }
    }
}

pub(crate) unsafe fn read_varint(ptr: *const u8) -> (u64, usize) {
    let mut result: u64 = 0;
    let mut shift = 0u32;
    let mut consumed = 0usize;
    loop {
        // SAFETY: caller guarantees `ptr` addresses a valid varint prefix.
        let byte = unsafe { *ptr.add(consumed) };
        consumed += 1;
        result |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    (result, consumed)
}

pub(crate) fn encode_out_string(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 9);
    encode_varint(bytes.len() as u64, &mut out);
    out.extend_from_slice(bytes);
    out.push(0);
    out
}

/// Returns (length, pointer to first data byte).
pub(crate) unsafe fn read_out_string(ptr: *const u8) -> (usize, *const u8) {
    unsafe {
        let (len, varint_len) = read_varint(ptr);
        (len as usize, ptr.add(varint_len))
    }
}

pub(crate) unsafe fn out_string_as_slice<'a>(ptr: *const u8) -> &'a [u8] {
    unsafe {
        let (len, data) = read_out_string(ptr);
        std::slice::from_raw_parts(data, len)
    }
}

// ---------------------------------------------------------------------
// Collection header: { count: u64 } ++ items (count seq items, or 2*count
// alternating key/value for a mapping)
// ---------------------------------------------------------------------

pub(crate) fn encode_collection(items: &[V]) -> Vec<u8> {
    let mut out = Vec::with_capacity(WORD + items.len() * WORD);
    out.extend_from_slice(&u64_bytes(items.len() as u64));
    for item in items {
        out.extend_from_slice(&u64_bytes(item.bits()));
    }
    out
}

pub(crate) unsafe fn read_collection_len(ptr: *const u8) -> usize {
    unsafe { read_u64(ptr) as usize }
}

pub(crate) unsafe fn read_collection_item(ptr: *const u8, index: usize) -> V {
    unsafe {
        let word = read_u64(ptr.add(WORD + index * WORD));
        V(word)
    }
}

pub(crate) unsafe fn read_collection_items<'a>(ptr: *const u8, count: usize) -> &'a [V] {
    unsafe { std::slice::from_raw_parts(ptr.add(WORD) as *const V, count) }
}

/// Overwrites item `index` in place. Used only by relocation, which owns
/// exclusive access to the buffer it's rewriting.
pub(crate) unsafe fn write_collection_item(ptr: *const u8, index: usize, v: V) {
    unsafe {
        let dst = ptr.add(WORD + index * WORD) as *mut u8;
        std::ptr::copy_nonoverlapping(u64_bytes(v.bits()).as_ptr(), dst, WORD);
    }
}

// ---------------------------------------------------------------------
// Indirect record: { flags: u64 } ++ present fields in order
// (value?, anchor?, tag?)
// ---------------------------------------------------------------------

pub(crate) mod indirect_flags {
    pub const HAS_VALUE: u64 = 0b001;
    pub const HAS_ANCHOR: u64 = 0b010;
    pub const HAS_TAG: u64 = 0b100;
}

pub(crate) struct IndirectFields {
    pub value: Option<V>,
    pub anchor: Option<V>,
    pub tag: Option<V>,
}

pub(crate) fn encode_indirect(fields: &IndirectFields) -> Vec<u8> {
    let mut flags = 0u64;
    if fields.value.is_some() {
        flags |= indirect_flags::HAS_VALUE;
    }
    if fields.anchor.is_some() {
        flags |= indirect_flags::HAS_ANCHOR;
    }
    if fields.tag.is_some() {
        flags |= indirect_flags::HAS_TAG;
    }
    let mut out = Vec::with_capacity(WORD * 4);
    out.extend_from_slice(&u64_bytes(flags));
    for field in [fields.value, fields.anchor, fields.tag].into_iter().flatten() {
        out.extend_from_slice(&u64_bytes(field.bits()));
    }
    out
}

pub(crate) unsafe fn read_indirect(ptr: *const u8) -> IndirectFields {
    unsafe {
        let flags = read_u64(ptr);
        let mut offset = WORD;
        let mut next = |present: bool| -> Option<V> {
            if present {
                let word = read_u64(ptr.add(offset));
                offset += WORD;
                Some(V(word))
            } else {
                None
            }
        };
        let value = next(flags & indirect_flags::HAS_VALUE != 0);
        let anchor = next(flags & indirect_flags::HAS_ANCHOR != 0);
        let tag = next(flags & indirect_flags::HAS_TAG != 0);
        IndirectFields { value, anchor, tag }
    }
}

/// Overwrites the present fields of an indirect record in place, keeping
/// the same presence flags (and thus the same record length). Used only
/// by relocation.
pub(crate) unsafe fn write_indirect(ptr: *const u8, fields: &IndirectFields) {
    unsafe {
        let flags = read_u64(ptr);
        let mut offset = WORD;
        let mut write_if = |v: Option<V>, bit: u64| {
            if flags & bit != 0 {
                if let Some(val) = v {
                    let dst = ptr.add(offset) as *mut u8;
                    std::ptr::copy_nonoverlapping(u64_bytes(val.bits()).as_ptr(), dst, WORD);
                }
                offset += WORD;
            }
        };
        write_if(fields.value, indirect_flags::HAS_VALUE);
        write_if(fields.anchor, indirect_flags::HAS_ANCHOR);
        write_if(fields.tag, indirect_flags::HAS_TAG);
    }
}
