//! MIME header: ordered multimap of fields with duplicate chains, a
//! presence bitmap, a slot accelerator, and the cooked Cache-Control /
//! Pragma cache.
//!
//! Grounded in `MIMEHdrImpl` in `original_source/proxy/hdrs/MIME.h` and the
//! field-attach/detach logic in `original_source/proxy/hdrs/MIME.cc`.

use super::cooked::{self, CookedCache};
use super::field::{FieldFlags, Readiness, SLOTNUM_UNKNOWN};
use crate::heap::{HeaderHeap, ObjHandle};
use crate::wks::{self, WksIdx, ACCEL_SLOT_COUNT};

#[derive(Debug, Clone)]
pub struct MimeHeader {
    pub(crate) first_block: Option<ObjHandle>,
    pub(crate) tail_block: Option<ObjHandle>,
    presence_bitmap: u64,
    accel: [u8; ACCEL_SLOT_COUNT],
    pub cooked: CookedCache,
}

impl MimeHeader {
    pub fn new() -> Self {
        Self {
            first_block: None,
            tail_block: None,
            presence_bitmap: 0,
            accel: [SLOTNUM_UNKNOWN; ACCEL_SLOT_COUNT],
            cooked: CookedCache::default(),
        }
    }

    pub fn presence_bitmap(&self) -> u64 {
        self.presence_bitmap
    }

    pub fn accel_slot(&self, accel_id: u8) -> u8 {
        self.accel[accel_id as usize]
    }

    pub(crate) fn set_presence_bitmap(&mut self, bits: u64) {
        self.presence_bitmap = bits;
    }

    pub(crate) fn set_accel_slot(&mut self, accel_id: u8, slot: u8) {
        self.accel[accel_id as usize] = slot;
    }
}

impl Default for MimeHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// Address of one field occurrence.
pub type FieldAddr = (ObjHandle, u16);

/// Creates a fresh MIME header object with its first field block.
pub fn create(heap: &mut HeaderHeap) -> ObjHandle {
    let mime_handle = heap.allocate_mime_header().expect("mime header alloc");
    let block_handle = heap.allocate_field_block().expect("field block alloc");
    let mime = heap.mime_mut(mime_handle);
    mime.first_block = Some(block_handle);
    mime.tail_block = Some(block_handle);
    mime_handle
}

fn names_equal_case_insensitive(heap: &HeaderHeap, addr_name: crate::heap::StrRef, name: &str) -> bool {
    let stored = heap.str_bytes(addr_name);
    stored.eq_ignore_ascii_case(name.as_bytes())
}

/// Finds the dup-chain head for `name`, if any live field with that name
/// exists. Implements the WKS-accelerated / linear-fallback lookup of
/// spec.md §4.4.
pub fn field_find(heap: &HeaderHeap, mime: ObjHandle, name: &str) -> Option<FieldAddr> {
    let header = heap.mime(mime);
    let wks_idx = wks::tokenize_field(name);

    if wks_idx != wks::NOT_WKS {
        let Some(mask) = wks::presence_mask(wks_idx) else {
            return linear_find(heap, mime, name, wks_idx);
        };
        if header.presence_bitmap & mask == 0 {
            return None;
        }
        if let Some(accel_id) = wks::accel_slot(wks_idx) {
            let slot = header.accel_slot(accel_id);
            if slot != SLOTNUM_UNKNOWN {
                let first = header.first_block?;
                return Some((first, slot as u16));
            }
        }
        return linear_find(heap, mime, name, wks_idx);
    }
    linear_find(heap, mime, name, wks_idx)
}

fn linear_find(heap: &HeaderHeap, mime: ObjHandle, name: &str, wks_idx: WksIdx) -> Option<FieldAddr> {
    let mut cur = heap.mime(mime).first_block;
    while let Some(block_handle) = cur {
        let block = heap.field_block(block_handle);
        for (slot, field) in block.iter_live() {
            let is_match = if wks_idx != wks::NOT_WKS {
                field.wks_idx == wks_idx
            } else {
                field.wks_idx == wks::NOT_WKS && names_equal_case_insensitive(heap, field.name, name)
            };
            if is_match && field.is_dup_head() {
                return Some((block_handle, slot));
            }
        }
        cur = block.next;
    }
    None
}

/// Every live occurrence of `addr`'s dup chain, head first, in chain order.
pub fn dup_chain(heap: &HeaderHeap, head: FieldAddr) -> Vec<FieldAddr> {
    let mut out = vec![head];
    let mut cur = heap.field_block(head.0).slot(head.1).next_dup;
    while let Some(addr) = cur {
        out.push(addr);
        cur = heap.field_block(addr.0).slot(addr.1).next_dup;
    }
    out
}

/// All live fields in the header, in block order, one entry per field (not
/// just dup heads).
pub fn iter_all_fields(heap: &HeaderHeap, mime: ObjHandle) -> Vec<FieldAddr> {
    let mut out = Vec::new();
    let mut cur = heap.mime(mime).first_block;
    while let Some(block_handle) = cur {
        let block = heap.field_block(block_handle);
        for (slot, _field) in block.iter_live() {
            out.push((block_handle, slot));
        }
        cur = block.next;
    }
    out
}

pub fn fields_count(heap: &HeaderHeap, mime: ObjHandle) -> usize {
    iter_all_fields(heap, mime).len()
}

fn find_tail_block(heap: &mut HeaderHeap, mime: ObjHandle) -> ObjHandle {
    let tail = heap.mime(mime).tail_block.expect("mime header always has a block chain");
    if !heap.field_block(tail).is_full() {
        return tail;
    }
    let new_block = heap.allocate_field_block().expect("field block alloc");
    heap.field_block_mut(tail).next = Some(new_block);
    heap.mime_mut(mime).tail_block = Some(new_block);
    new_block
}

/// Attaches a new field `name: value` to `mime`, always creating a new
/// slot (never overwriting) and splicing it into the name's dup chain.
/// This is the low-level primitive `ADD-HEADER` and (after clearing any
/// previous occurrence) `SET-HEADER` build on.
pub fn attach_field(heap: &mut HeaderHeap, mime: ObjHandle, name: &str, value: &str) -> FieldAddr {
    let wks_idx = wks::tokenize_field(name);
    let existing_head = field_find(heap, mime, name);

    let block_handle = find_tail_block(heap, mime);
    let slot = heap
        .field_block_mut(block_handle)
        .alloc_slot()
        .expect("tail block has room after find_tail_block");

    let name_ref = heap.duplicate_str(name.as_bytes());
    let value_ref = heap.duplicate_str(value.as_bytes());
    let is_cooked = wks::is_cooked_header(wks_idx);

    {
        let field = heap.field_block_mut(block_handle).slot_mut(slot);
        field.wks_idx = wks_idx;
        field.name = name_ref;
        field.value = value_ref;
        field.next_dup = None;
        field.readiness = Readiness::Live;
        field.flags = FieldFlags::NONE;
        if is_cooked {
            field.flags.set(FieldFlags::COOKED);
        }
    }
    let addr = (block_handle, slot);

    match existing_head {
        Some(head) => {
            let mut last = head;
            loop {
                let next = heap.field_block(last.0).slot(last.1).next_dup;
                match next {
                    Some(n) => last = n,
                    None => break,
                }
            }
            heap.field_block_mut(last.0).slot_mut(last.1).next_dup = Some(addr);
        }
        None => {
            heap.field_block_mut(block_handle).slot_mut(slot).flags.set(FieldFlags::DUP_HEAD);
            if let Some(mask) = wks::presence_mask(wks_idx) {
                heap.mime_mut(mime).presence_bitmap |= mask;
            }
            if let Some(accel_id) = wks::accel_slot(wks_idx) {
                let first = heap.mime(mime).first_block;
                if first == Some(block_handle) && (slot as u8) < SLOTNUM_UNKNOWN {
                    heap.mime_mut(mime).accel[accel_id as usize] = slot as u8;
                }
            }
        }
    }

    if is_cooked {
        recompute_cooked(heap, mime, wks_idx);
    }
    addr
}

/// Detaches (logically deletes) a single field occurrence.
pub fn detach_field(heap: &mut HeaderHeap, mime: ObjHandle, addr: FieldAddr) {
    let (block_handle, slot) = addr;
    let field = heap.field_block(block_handle).slot(slot).clone();
    if !field.is_live() {
        return;
    }
    let was_cooked = field.is_cooked();
    let wks_idx = field.wks_idx;
    let name_bytes = heap.str_bytes(field.name).to_vec();

    if field.is_dup_head() {
        let next = field.next_dup;
        match next {
            Some(new_head) => {
                heap.field_block_mut(new_head.0).slot_mut(new_head.1).flags.set(FieldFlags::DUP_HEAD);
                if let Some(accel_id) = wks::accel_slot(wks_idx) {
                    let first = heap.mime(mime).first_block;
                    let slot_val = if first == Some(new_head.0) && (new_head.1 as u8) < SLOTNUM_UNKNOWN {
                        new_head.1 as u8
                    } else {
                        SLOTNUM_UNKNOWN
                    };
                    heap.mime_mut(mime).accel[accel_id as usize] = slot_val;
                }
            }
            None => {
                if let Some(mask) = wks::presence_mask(wks_idx) {
                    heap.mime_mut(mime).presence_bitmap &= !mask;
                }
                if let Some(accel_id) = wks::accel_slot(wks_idx) {
                    heap.mime_mut(mime).accel[accel_id as usize] = SLOTNUM_UNKNOWN;
                }
            }
        }
    } else {
        // Unlink from the middle/end of the dup chain. A non-head field
        // always has a live dup chain headed by some other slot with the
        // same name; since custom (non-WKS) names don't get a bitmap/
        // accelerator shortcut, find that head by name equality instead of
        // by `wks_idx` alone (two different custom header names both carry
        // `NOT_WKS` and must not be confused).
        if let Some(head) = field_find_chain_head(heap, mime, wks_idx, &name_bytes) {
            let mut prev = head;
            loop {
                let next = heap.field_block(prev.0).slot(prev.1).next_dup;
                match next {
                    Some(n) if n == addr => {
                        heap.field_block_mut(prev.0).slot_mut(prev.1).next_dup = field.next_dup;
                        break;
                    }
                    Some(n) => prev = n,
                    None => break,
                }
            }
        }
    }

    let name_ref = field.name;
    let value_ref = field.value;
    {
        let slot_mut = heap.field_block_mut(block_handle).slot_mut(slot);
        slot_mut.readiness = Readiness::Deleted;
        slot_mut.flags = FieldFlags::NONE;
    }
    heap.free_string(name_ref, name_ref.len());
    heap.free_string(value_ref, value_ref.len());

    maybe_unlink_block(heap, mime, block_handle);

    if was_cooked {
        recompute_cooked(heap, mime, wks_idx);
    }
}

/// Finds the dup-chain head matching both `wks_idx` and, for non-WKS
/// (custom) names, the exact name bytes — needed because two distinct
/// custom header names both tokenize to `NOT_WKS` and must not be
/// confused when walking a dup chain to unlink a non-head occurrence.
fn field_find_chain_head(
    heap: &HeaderHeap,
    mime: ObjHandle,
    wks_idx: WksIdx,
    name_bytes: &[u8],
) -> Option<FieldAddr> {
    let mut cur = heap.mime(mime).first_block;
    while let Some(block_handle) = cur {
        let block = heap.field_block(block_handle);
        for (slot, field) in block.iter_live() {
            if field.wks_idx == wks_idx && field.is_dup_head() {
                let matches = if wks_idx != wks::NOT_WKS {
                    true
                } else {
                    heap.str_bytes(field.name).eq_ignore_ascii_case(name_bytes)
                };
                if matches {
                    return Some((block_handle, slot));
                }
            }
        }
        cur = block.next;
    }
    None
}

/// Same as `field_find` but by an already-tokenized WKS index (used
/// internally once we already know the field we're unlinking).
fn field_find_by_wks(heap: &HeaderHeap, mime: ObjHandle, wks_idx: WksIdx) -> Option<FieldAddr> {
    let mut cur = heap.mime(mime).first_block;
    while let Some(block_handle) = cur {
        let block = heap.field_block(block_handle);
        for (slot, field) in block.iter_live() {
            if field.wks_idx == wks_idx && field.is_dup_head() {
                return Some((block_handle, slot));
            }
        }
        cur = block.next;
    }
    None
}

fn maybe_unlink_block(heap: &mut HeaderHeap, mime: ObjHandle, block_handle: ObjHandle) {
    let first = heap.mime(mime).first_block;
    if Some(block_handle) == first {
        return; // the first inline block is never discarded
    }
    if !heap.field_block(block_handle).all_deleted() {
        return;
    }
    // Find the predecessor and splice this block out of the chain.
    let mut prev = first;
    while let Some(p) = prev {
        let next = heap.field_block(p).next;
        if next == Some(block_handle) {
            let after = heap.field_block(block_handle).next;
            heap.field_block_mut(p).next = after;
            if heap.mime(mime).tail_block == Some(block_handle) {
                heap.mime_mut(mime).tail_block = Some(p);
            }
            heap.deallocate_obj(block_handle);
            return;
        }
        prev = next;
    }
}

/// `RM-HEADER` / `rm_header`: deletes every occurrence of `name`.
pub fn rm_header(heap: &mut HeaderHeap, mime: ObjHandle, name: &str) -> usize {
    let Some(head) = field_find(heap, mime, name) else {
        return 0;
    };
    let chain = dup_chain(heap, head);
    let n = chain.len();
    for addr in chain {
        detach_field(heap, mime, addr);
    }
    n
}

/// `SET-HEADER`: overwrite the first occurrence, delete any dups,
/// otherwise create. Per spec.md §4.5, never sets an empty value.
pub fn set_header(heap: &mut HeaderHeap, mime: ObjHandle, name: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    if let Some(head) = field_find(heap, mime, name) {
        let chain = dup_chain(heap, head);
        for addr in &chain[1..] {
            detach_field(heap, mime, *addr);
        }
        let value_ref = heap.duplicate_str(value.as_bytes());
        let old_value = heap.field_block(head.0).slot(head.1).value;
        heap.free_string(old_value, old_value.len());
        heap.field_block_mut(head.0).slot_mut(head.1).value = value_ref;
        if heap.field_block(head.0).slot(head.1).is_cooked() {
            let wks_idx = heap.field_block(head.0).slot(head.1).wks_idx;
            recompute_cooked(heap, mime, wks_idx);
        }
    } else {
        attach_field(heap, mime, name, value);
    }
}

/// `ADD-HEADER`: always appends, never merges.
pub fn add_header(heap: &mut HeaderHeap, mime: ObjHandle, name: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    attach_field(heap, mime, name, value);
}

fn recompute_cooked(heap: &mut HeaderHeap, mime: ObjHandle, wks_idx: WksIdx) {
    if wks::is_cache_control(wks_idx) {
        if let Some(head) = field_find_by_wks(heap, mime, wks_idx) {
            let chain = dup_chain(heap, head);
            let values: Vec<String> = chain
                .iter()
                .map(|a| heap.str_str(heap.field_block(a.0).slot(a.1).value).to_string())
                .collect();
            let cc = cooked::recompute_cache_control(values.iter().map(|s| s.as_str()));
            heap.mime_mut(mime).cooked.cache_control = cc;
        } else {
            heap.mime_mut(mime).cooked.cache_control = Default::default();
        }
    } else if wks::is_pragma(wks_idx) {
        if let Some(head) = field_find_by_wks(heap, mime, wks_idx) {
            let chain = dup_chain(heap, head);
            let values: Vec<String> = chain
                .iter()
                .map(|a| heap.str_str(heap.field_block(a.0).slot(a.1).value).to_string())
                .collect();
            let p = cooked::recompute_pragma(values.iter().map(|s| s.as_str()));
            heap.mime_mut(mime).cooked.pragma = p;
        } else {
            heap.mime_mut(mime).cooked.pragma = Default::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_header_overwrites_and_collapses_dups() {
        let mut heap = HeaderHeap::new();
        let mime = create(&mut heap);
        attach_field(&mut heap, mime, "Via", "1.1 a");
        attach_field(&mut heap, mime, "Via", "1.1 b");
        assert_eq!(fields_count(&heap, mime), 2);

        set_header(&mut heap, mime, "Via", "1.1 proxy");
        assert_eq!(fields_count(&heap, mime), 1);
        let head = field_find(&heap, mime, "Via").unwrap();
        assert_eq!(heap.str_str(heap.field_block(head.0).slot(head.1).value), "1.1 proxy");
    }

    #[test]
    fn set_header_never_sets_empty_value() {
        let mut heap = HeaderHeap::new();
        let mime = create(&mut heap);
        set_header(&mut heap, mime, "X-Test", "");
        assert!(field_find(&heap, mime, "X-Test").is_none());
    }

    #[test]
    fn presence_bitmap_and_accelerator_invariants() {
        let mut heap = HeaderHeap::new();
        let mime = create(&mut heap);
        attach_field(&mut heap, mime, "Host", "example.com");
        let wks = wks::tokenize_field("Host");
        let mask = wks::presence_mask(wks).unwrap();
        assert!(heap.mime(mime).presence_bitmap() & mask != 0);

        rm_header(&mut heap, mime, "Host");
        assert!(heap.mime(mime).presence_bitmap() & mask == 0);
        assert!(field_find(&heap, mime, "Host").is_none());
    }

    #[test]
    fn fields_count_matches_live_slots() {
        let mut heap = HeaderHeap::new();
        let mime = create(&mut heap);
        attach_field(&mut heap, mime, "X-A", "1");
        attach_field(&mut heap, mime, "X-B", "2");
        attach_field(&mut heap, mime, "X-A", "3");
        assert_eq!(fields_count(&heap, mime), 3);
        let head = field_find(&heap, mime, "X-A").unwrap();
        detach_field(&mut heap, mime, head);
        assert_eq!(fields_count(&heap, mime), 2);
    }

    #[test]
    fn cache_control_cooks_on_mutation() {
        let mut heap = HeaderHeap::new();
        let mime = create(&mut heap);
        attach_field(&mut heap, mime, "Cache-Control", "public, max-age=300, s-maxage=600");
        assert_eq!(heap.mime(mime).cooked.cache_control.max_age, 300);
        assert_eq!(heap.mime(mime).cooked.cache_control.s_maxage, 600);

        set_header(&mut heap, mime, "Cache-Control", "public; max-age=30");
        assert_eq!(heap.mime(mime).cooked.cache_control.mask, 0);
        assert_eq!(heap.mime(mime).cooked.cache_control.max_age, 0);
    }
}
