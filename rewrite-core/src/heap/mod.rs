//! Header heap: the arena that owns every [`crate::url::Url`],
//! [`crate::mime::MimeHeader`] and [`crate::mime::FieldBlock`] allocated
//! while a transaction's headers are being read or rewritten, plus the
//! string heaps those objects' names/values point into.
//!
//! Grounded in `original_source/proxy/hdrs/HdrHeap.{h,cc}`. The pointer
//! heap there chains raw-pointer blocks; here it chains fixed-capacity
//! `Vec` blocks and objects are addressed by [`ObjHandle`] rather than by
//! raw pointer, which is the idiomatic Rust analogue and keeps the
//! "objects never move once allocated" invariant for free (a `Vec` never
//! reallocates past the capacity it was created with).

mod marshal;
mod pointer;
mod string_heap;

pub use marshal::{unmarshal, MAGIC};
pub use pointer::{ObjHandle, ObjType, Object};
pub use string_heap::StrRef;

use crate::error::HeapError;
use crate::mime::{FieldBlock, MimeHeader};
use crate::url::Url;
use pointer::PointerHeap;
use string_heap::StringHeapSet;

/// Default size, in bytes, of a freshly allocated RW string heap. Matches
/// `HdrHeap::DEFAULT_SIZE` in the original implementation.
pub const DEFAULT_STR_HEAP_SIZE: usize = 2048;

/// Threshold of accumulated "lost" (freed but unreclaimed) string bytes
/// beyond which the next allocation forces a coalesce.
pub const LOST_STRING_THRESHOLD: usize = 1024;

/// Maximum size of a single typed-object allocation.
pub const MAX_OBJ_SIZE: usize = 1 << 20;

/// An arena owning pointer-heap objects and string heaps for one
/// transaction's worth of headers.
pub struct HeaderHeap {
    objects: PointerHeap,
    strings: StringHeapSet,
}

impl HeaderHeap {
    pub fn new() -> Self {
        Self {
            objects: PointerHeap::new(),
            strings: StringHeapSet::new(DEFAULT_STR_HEAP_SIZE),
        }
    }

    // ---- pointer heap ----

    pub fn allocate_url(&mut self) -> Result<ObjHandle, HeapError> {
        self.objects.allocate(Object::Url(Url::default()))
    }

    pub fn allocate_mime_header(&mut self) -> Result<ObjHandle, HeapError> {
        self.objects.allocate(Object::MimeHeader(MimeHeader::new()))
    }

    pub fn allocate_field_block(&mut self) -> Result<ObjHandle, HeapError> {
        self.objects
            .allocate(Object::FieldBlock(FieldBlock::new()))
    }

    pub fn deallocate_obj(&mut self, handle: ObjHandle) {
        self.objects.deallocate(handle);
    }

    pub fn get(&self, handle: ObjHandle) -> &Object {
        self.objects.get(handle)
    }

    pub fn get_mut(&mut self, handle: ObjHandle) -> &mut Object {
        self.objects.get_mut(handle)
    }

    pub fn url(&self, handle: ObjHandle) -> &Url {
        match self.get(handle) {
            Object::Url(u) => u,
            other => panic!("handle does not refer to a Url object: {other:?}"),
        }
    }

    pub fn url_mut(&mut self, handle: ObjHandle) -> &mut Url {
        match self.get_mut(handle) {
            Object::Url(u) => u,
            other => panic!("handle does not refer to a Url object: {other:?}"),
        }
    }

    pub fn mime(&self, handle: ObjHandle) -> &MimeHeader {
        match self.get(handle) {
            Object::MimeHeader(m) => m,
            other => panic!("handle does not refer to a MimeHeader object: {other:?}"),
        }
    }

    pub fn mime_mut(&mut self, handle: ObjHandle) -> &mut MimeHeader {
        match self.get_mut(handle) {
            Object::MimeHeader(m) => m,
            other => panic!("handle does not refer to a MimeHeader object: {other:?}"),
        }
    }

    pub fn field_block(&self, handle: ObjHandle) -> &FieldBlock {
        match self.get(handle) {
            Object::FieldBlock(f) => f,
            other => panic!("handle does not refer to a FieldBlock object: {other:?}"),
        }
    }

    pub fn field_block_mut(&mut self, handle: ObjHandle) -> &mut FieldBlock {
        match self.get_mut(handle) {
            Object::FieldBlock(f) => f,
            other => panic!("handle does not refer to a FieldBlock object: {other:?}"),
        }
    }

    /// Number of live (non-deallocated) objects, for testing/diagnostics.
    pub fn live_object_count(&self) -> usize {
        self.objects.live_count()
    }

    // ---- string heap ----

    /// Coalesces first if accumulated lost bytes crossed the threshold —
    /// only `HeaderHeap` knows how to relocate live objects' `StrRef`
    /// fields, so the proactive coalesce can't live inside `StringHeapSet`.
    fn coalesce_if_needed(&mut self) {
        if self.strings.needs_coalesce() {
            self.coalesce_strings();
        }
    }

    pub fn allocate_str(&mut self, n: usize) -> StrRef {
        self.coalesce_if_needed();
        self.strings.allocate_str(n)
    }

    pub fn duplicate_str(&mut self, s: &[u8]) -> StrRef {
        self.coalesce_if_needed();
        self.strings.duplicate_str(s)
    }

    pub fn expand_str(&mut self, old: StrRef, old_n: usize, new_n: usize) -> StrRef {
        self.coalesce_if_needed();
        self.strings.expand_str(old, old_n, new_n)
    }

    pub fn free_string(&mut self, s: StrRef, n: usize) {
        self.strings.free_string(s, n);
    }

    pub fn str_bytes(&self, s: StrRef) -> &[u8] {
        self.strings.bytes(s)
    }

    pub fn str_str(&self, s: StrRef) -> &str {
        std::str::from_utf8(self.str_bytes(s)).unwrap_or("")
    }

    pub fn lost_string_space(&self) -> usize {
        self.strings.lost_bytes
    }

    /// Forces a coalesce: every string referenced by a live pointer-heap
    /// object (URL components, MIME field names/values) is copied into a
    /// fresh string heap, and each object's `StrRef` fields are rewritten in
    /// place to point at it. The old RW/RO buffers are then dropped.
    /// Grounded in `HdrHeap::coalesce_str_heaps`
    /// (`original_source/proxy/hdrs/HdrHeap.cc`); unlike the original this
    /// doesn't require a generation-tracked "in use" bitmap first, since the
    /// relocation walk below only ever touches strings objects still hold.
    pub fn coalesce_strings(&mut self) {
        let mut fresh = StringHeapSet::new(DEFAULT_STR_HEAP_SIZE);
        for (_, obj) in self.objects.iter_live_mut() {
            match obj {
                Object::Empty => {}
                Object::Url(url) => {
                    let refs = url.str_refs();
                    let mut moved = [StrRef::default(); 8];
                    for (i, r) in refs.iter().enumerate() {
                        moved[i] = relocate_one(&self.strings, &mut fresh, *r);
                    }
                    url.set_components_from_refs(moved);
                }
                Object::MimeHeader(_) => {}
                Object::FieldBlock(block) => {
                    for idx in 0..block.capacity() as u16 {
                        let field = block.slot_mut(idx);
                        if !field.is_live() {
                            // Deleted/Empty slots' strings are exactly the
                            // "lost" bytes coalesce exists to reclaim —
                            // drop them instead of copying them forward.
                            field.name = StrRef::default();
                            field.value = StrRef::default();
                            continue;
                        }
                        field.name = relocate_one(&self.strings, &mut fresh, field.name);
                        field.value = relocate_one(&self.strings, &mut fresh, field.value);
                    }
                }
            }
        }
        self.strings = fresh;
    }

    /// Attaches another heap's string heaps into free RO slots, bumping
    /// their reference counts rather than copying bytes. Coalesces first
    /// if there is no room.
    pub fn inherit_string_heaps(&mut self, src: &HeaderHeap) {
        self.strings.inherit_from(&src.strings);
    }

    /// Serializes this heap into a byte image. Returns `bytes::Bytes` so a
    /// host can hand the image to a socket write or a cache without an extra
    /// copy.
    pub fn marshal(&self) -> Result<bytes::Bytes, HeapError> {
        marshal::marshal(self)
    }
}

fn relocate_one(old: &StringHeapSet, fresh: &mut StringHeapSet, r: StrRef) -> StrRef {
    if r.is_empty() {
        return r;
    }
    fresh.duplicate_str(old.bytes(r))
}

impl Default for HeaderHeap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_and_deallocate_obj_roundtrip() {
        let mut heap = HeaderHeap::new();
        let h = heap.allocate_mime_header().unwrap();
        assert_eq!(heap.live_object_count(), 1);
        heap.deallocate_obj(h);
        assert_eq!(heap.live_object_count(), 0);
    }

    #[test]
    fn duplicate_str_roundtrips_bytes() {
        let mut heap = HeaderHeap::new();
        let s = heap.duplicate_str(b"hello world");
        assert_eq!(heap.str_bytes(s), b"hello world");
    }

    #[test]
    fn lost_string_space_accumulates() {
        let mut heap = HeaderHeap::new();
        let s = heap.duplicate_str(b"abcdefgh");
        heap.free_string(s, 8);
        assert_eq!(heap.lost_string_space(), 8);
    }

    #[test]
    fn coalesce_strings_rewrites_live_field_refs() {
        let mut heap = HeaderHeap::new();
        let mime = crate::mime::create(&mut heap);
        crate::mime::add_header(&mut heap, mime, "X-Test", "hello world");

        heap.coalesce_strings();

        let addr = crate::mime::field_find(&heap, mime, "X-Test").unwrap();
        let value = heap.field_block(addr.0).slot(addr.1).value;
        assert_eq!(heap.str_bytes(value), b"hello world");
    }

    #[test]
    fn duplicate_str_auto_coalesces_past_lost_threshold() {
        let mut heap = HeaderHeap::new();
        let mime = crate::mime::create(&mut heap);
        crate::mime::add_header(&mut heap, mime, "X-Keep", "still here");

        // Churn enough freed strings to cross LOST_STRING_THRESHOLD and
        // force an automatic coalesce on the next allocation.
        for i in 0..200 {
            let s = heap.duplicate_str(format!("filler-{i}").as_bytes());
            heap.free_string(s, 10);
        }

        let addr = crate::mime::field_find(&heap, mime, "X-Keep").unwrap();
        let value = heap.field_block(addr.0).slot(addr.1).value;
        assert_eq!(heap.str_bytes(value), b"still here");
    }

    #[test]
    fn marshal_unmarshal_roundtrips_a_header() {
        let mut heap = HeaderHeap::new();
        let mime = crate::mime::create(&mut heap);
        crate::mime::add_header(&mut heap, mime, "X-Test", "one");
        crate::mime::add_header(&mut heap, mime, "X-Test", "two");

        let image = heap.marshal().unwrap();
        assert_eq!(&image[0..4], &MAGIC.to_le_bytes()[..]);

        let restored = unmarshal(&image).unwrap();
        let addr = crate::mime::field_find(&restored, mime, "X-Test").unwrap();
        let chain = crate::mime::dup_chain(&restored, addr);
        assert_eq!(chain.len(), 2);
    }
}
