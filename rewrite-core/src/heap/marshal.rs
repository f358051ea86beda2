//! Marshal / unmarshal: serializes a [`super::HeaderHeap`] into a flat,
//! relocatable byte image and reconstructs an equivalent heap from one.
//!
//! Grounded in `HdrHeap::marshal` / `HdrHeap::unmarshal` in
//! `original_source/proxy/hdrs/HdrHeap.cc`. The original packs the pointer
//! heap's raw pointers into byte offsets so the image can be mapped
//! anywhere; here the pointer heap is already offset-based (`ObjHandle`),
//! so marshal only needs to renumber handles into a dense sequential id
//! space and flatten every referenced string into one contiguous table.

use super::pointer::{Object, ObjType};
use super::string_heap::StrRef;
use super::{HeaderHeap, ObjHandle};
use crate::error::HeapError;
use crate::mime::{FieldBlock, MimeField, MimeHeader, Readiness};
use crate::url::Url;
use std::collections::HashMap;

/// Magic number identifying a marshalled header heap image (`"MHDR"`).
pub const MAGIC: u32 = 0x4d48_4452;
const VERSION: u32 = 1;

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }
    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }
    fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }
    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }
    fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }
    fn i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }
    fn bytes(&mut self, v: &[u8]) {
        self.u32(v.len() as u32);
        self.buf.extend_from_slice(v);
    }
    /// A possibly-absent object reference, written as `id + 1` (0 = None).
    fn opt_id(&mut self, id: Option<u32>) {
        self.u32(id.map(|i| i + 1).unwrap_or(0));
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }
    fn need(&self, n: usize) -> Result<(), HeapError> {
        if self.pos + n > self.buf.len() {
            return Err(HeapError::TruncatedHeader {
                expected: self.pos + n,
                actual: self.buf.len(),
            });
        }
        Ok(())
    }
    fn u8(&mut self) -> Result<u8, HeapError> {
        self.need(1)?;
        let v = self.buf[self.pos];
        self.pos += 1;
        Ok(v)
    }
    fn u16(&mut self) -> Result<u16, HeapError> {
        self.need(2)?;
        let v = u16::from_le_bytes(self.buf[self.pos..self.pos + 2].try_into().unwrap());
        self.pos += 2;
        Ok(v)
    }
    fn u32(&mut self) -> Result<u32, HeapError> {
        self.need(4)?;
        let v = u32::from_le_bytes(self.buf[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        Ok(v)
    }
    fn u64(&mut self) -> Result<u64, HeapError> {
        self.need(8)?;
        let v = u64::from_le_bytes(self.buf[self.pos..self.pos + 8].try_into().unwrap());
        self.pos += 8;
        Ok(v)
    }
    fn i32(&mut self) -> Result<i32, HeapError> {
        self.need(4)?;
        let v = i32::from_le_bytes(self.buf[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        Ok(v)
    }
    fn bytes(&mut self) -> Result<Vec<u8>, HeapError> {
        let len = self.u32()? as usize;
        self.need(len)?;
        let v = self.buf[self.pos..self.pos + len].to_vec();
        self.pos += len;
        Ok(v)
    }
    fn opt_id(&mut self) -> Result<Option<u32>, HeapError> {
        let raw = self.u32()?;
        Ok(if raw == 0 { None } else { Some(raw - 1) })
    }
}

/// Serializes `heap` into a byte image. Only live objects are carried;
/// deallocated slots and unreferenced string-heap bytes are dropped, which
/// doubles as a compaction pass.
pub fn marshal(heap: &HeaderHeap) -> Result<bytes::Bytes, HeapError> {
    let live: Vec<(ObjHandle, &Object)> = heap.objects.iter_live().collect();
    let id_of: HashMap<ObjHandle, u32> = live
        .iter()
        .enumerate()
        .map(|(i, (h, _))| (*h, i as u32))
        .collect();

    let mut w = Writer::new();
    w.u32(MAGIC);
    w.u32(VERSION);
    w.u32(live.len() as u32);

    for (_, obj) in &live {
        w.u8(obj.obj_type() as u8);
        match obj {
            Object::Empty => {}
            Object::Url(url) => write_url(&mut w, heap, url),
            Object::MimeHeader(mime) => write_mime_header(&mut w, &id_of, mime),
            Object::FieldBlock(block) => write_field_block(&mut w, heap, &id_of, block),
        }
    }
    Ok(bytes::Bytes::from(w.buf))
}

fn write_str(w: &mut Writer, heap: &HeaderHeap, s: StrRef) {
    w.bytes(heap.str_bytes(s));
}

fn write_url(w: &mut Writer, heap: &HeaderHeap, url: &Url) {
    for s in url.str_refs() {
        write_str(w, heap, s);
    }
    w.u16(url.port_raw());
    w.u8(url.url_type().tag());
}

fn write_mime_header(w: &mut Writer, id_of: &HashMap<ObjHandle, u32>, mime: &MimeHeader) {
    w.opt_id(mime.first_block.map(|h| id_of[&h]));
    w.opt_id(mime.tail_block.map(|h| id_of[&h]));
    w.u64(mime.presence_bitmap());
    for slot in 0..crate::wks::ACCEL_SLOT_COUNT {
        w.u8(mime.accel_slot(slot as u8));
    }
    w.u16(mime.cooked.cache_control.mask);
    w.i32(mime.cooked.cache_control.max_age);
    w.i32(mime.cooked.cache_control.s_maxage);
    w.i32(mime.cooked.cache_control.max_stale);
    w.i32(mime.cooked.cache_control.min_fresh);
    w.u8(if mime.cooked.pragma.no_cache { 1 } else { 0 });
}

fn write_field_block(w: &mut Writer, heap: &HeaderHeap, id_of: &HashMap<ObjHandle, u32>, block: &FieldBlock) {
    w.opt_id(block.next.map(|h| id_of[&h]));
    w.u16(block.capacity() as u16);
    let all: Vec<_> = block.iter_all().collect();
    w.u16(all.len() as u16);
    for (_, field) in all {
        w.i32(field.wks_idx as i32);
        write_str(w, heap, field.name);
        write_str(w, heap, field.value);
        w.opt_id(field.next_dup.map(|(h, _)| id_of[&h]));
        w.u16(field.next_dup.map(|(_, s)| s).unwrap_or(0));
        w.u8(readiness_tag(field.readiness));
        w.u8(field.flags.0);
    }
}

fn readiness_tag(r: Readiness) -> u8 {
    match r {
        Readiness::Empty => 0,
        Readiness::Detached => 1,
        Readiness::Live => 2,
        Readiness::Deleted => 3,
    }
}

fn readiness_from_tag(tag: u8) -> Readiness {
    match tag {
        1 => Readiness::Detached,
        2 => Readiness::Live,
        3 => Readiness::Deleted,
        _ => Readiness::Empty,
    }
}

/// Reconstructs a [`HeaderHeap`] from a byte image produced by [`marshal`].
/// All strings land in a single fresh RW string heap (the image carries no
/// RO-heap structure; everything was already flattened on write).
pub fn unmarshal(image: &[u8]) -> Result<HeaderHeap, HeapError> {
    let mut r = Reader::new(image);
    let magic = r.u32()?;
    if magic != MAGIC {
        return Err(HeapError::BadMagic);
    }
    let _version = r.u32()?;
    let count = r.u32()? as usize;

    let mut heap = HeaderHeap::new();
    // Pass 1: allocate every object as an empty placeholder of the right
    // kind, establishing the id -> ObjHandle mapping before any object
    // references another by id.
    let mut id_to_handle = Vec::with_capacity(count);
    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        let tag = r.u8()?;
        let obj_type = ObjType::from_tag(tag).ok_or(HeapError::UnknownObjectType(tag))?;
        let handle = match obj_type {
            ObjType::Empty | ObjType::Url => heap.allocate_url()?,
            ObjType::MimeHeader => heap.allocate_mime_header()?,
            ObjType::FieldBlock => heap.allocate_field_block()?,
            ObjType::HttpHeader => return Err(HeapError::UnknownObjectType(tag)),
        };
        id_to_handle.push(handle);
        records.push((obj_type, read_record(&mut r, obj_type)?));
    }

    for (id, (obj_type, record)) in records.into_iter().enumerate() {
        let handle = id_to_handle[id];
        apply_record(&mut heap, handle, obj_type, record, &id_to_handle)?;
    }

    Ok(heap)
}

/// Raw (not-yet-relocated) field data read from the image for one object.
enum Record {
    Url(UrlRecord),
    MimeHeader(MimeHeaderRecord),
    FieldBlock(FieldBlockRecord),
}

struct UrlRecord {
    parts: Vec<Vec<u8>>,
    port: u16,
    url_type: u8,
}

struct MimeHeaderRecord {
    first_block: Option<u32>,
    tail_block: Option<u32>,
    presence_bitmap: u64,
    accel: Vec<u8>,
    cc_mask: u16,
    max_age: i32,
    s_maxage: i32,
    max_stale: i32,
    min_fresh: i32,
    pragma_no_cache: bool,
}

struct RawField {
    wks_idx: i32,
    name: Vec<u8>,
    value: Vec<u8>,
    next_dup_block: Option<u32>,
    next_dup_slot: u16,
    readiness: u8,
    flags: u8,
}

struct FieldBlockRecord {
    next: Option<u32>,
    fields: Vec<RawField>,
}

fn read_record(r: &mut Reader, obj_type: ObjType) -> Result<Record, HeapError> {
    match obj_type {
        ObjType::Empty | ObjType::Url => {
            let mut parts = Vec::with_capacity(8);
            for _ in 0..8 {
                parts.push(r.bytes()?);
            }
            let port = r.u16()?;
            let url_type = r.u8()?;
            Ok(Record::Url(UrlRecord { parts, port, url_type }))
        }
        ObjType::HttpHeader => unreachable!("rejected before read_record is reached"),
        ObjType::MimeHeader => {
            let first_block = r.opt_id()?;
            let tail_block = r.opt_id()?;
            let presence_bitmap = r.u64()?;
            let mut accel = Vec::with_capacity(crate::wks::ACCEL_SLOT_COUNT);
            for _ in 0..crate::wks::ACCEL_SLOT_COUNT {
                accel.push(r.u8()?);
            }
            let cc_mask = r.u16()?;
            let max_age = r.i32()?;
            let s_maxage = r.i32()?;
            let max_stale = r.i32()?;
            let min_fresh = r.i32()?;
            let pragma_no_cache = r.u8()? != 0;
            Ok(Record::MimeHeader(MimeHeaderRecord {
                first_block,
                tail_block,
                presence_bitmap,
                accel,
                cc_mask,
                max_age,
                s_maxage,
                max_stale,
                min_fresh,
                pragma_no_cache,
            }))
        }
        ObjType::FieldBlock => {
            let next = r.opt_id()?;
            let _capacity = r.u16()?;
            let n = r.u16()? as usize;
            let mut fields = Vec::with_capacity(n);
            for _ in 0..n {
                let field_start = r.pos;
                let wks_idx = r.i32()?;
                let name = r.bytes()?;
                if name.is_empty() {
                    return Err(HeapError::ZeroLengthObject(field_start));
                }
                let value = r.bytes()?;
                let next_dup_block = r.opt_id()?;
                let next_dup_slot = r.u16()?;
                let readiness = r.u8()?;
                let flags = r.u8()?;
                fields.push(RawField {
                    wks_idx,
                    name,
                    value,
                    next_dup_block,
                    next_dup_slot,
                    readiness,
                    flags,
                });
            }
            Ok(Record::FieldBlock(FieldBlockRecord { next, fields }))
        }
    }
}

fn apply_record(
    heap: &mut HeaderHeap,
    handle: ObjHandle,
    obj_type: ObjType,
    record: Record,
    id_to_handle: &[ObjHandle],
) -> Result<(), HeapError> {
    match (obj_type, record) {
        (ObjType::Empty, _) => {
            heap.deallocate_obj(handle);
        }
        (ObjType::Url, Record::Url(rec)) => {
            let refs: Vec<StrRef> = rec.parts.iter().map(|p| heap.duplicate_str(p)).collect();
            let refs: [StrRef; 8] = refs.try_into().expect("exactly 8 url components");
            let url = heap.url_mut(handle);
            url.set_components_from_refs(refs);
            url.set_port(rec.port);
            url.set_url_type(crate::url::UrlType::from_tag(rec.url_type));
        }
        (ObjType::MimeHeader, Record::MimeHeader(rec)) => {
            let mime = heap.mime_mut(handle);
            mime.first_block = rec.first_block.map(|id| id_to_handle[id as usize]);
            mime.tail_block = rec.tail_block.map(|id| id_to_handle[id as usize]);
            mime.set_presence_bitmap(rec.presence_bitmap);
            for (i, v) in rec.accel.iter().enumerate() {
                mime.set_accel_slot(i as u8, *v);
            }
            mime.cooked.cache_control.mask = rec.cc_mask;
            mime.cooked.cache_control.max_age = rec.max_age;
            mime.cooked.cache_control.s_maxage = rec.s_maxage;
            mime.cooked.cache_control.max_stale = rec.max_stale;
            mime.cooked.cache_control.min_fresh = rec.min_fresh;
            mime.cooked.pragma.no_cache = rec.pragma_no_cache;
        }
        (ObjType::FieldBlock, Record::FieldBlock(rec)) => {
            let next = rec.next.map(|id| id_to_handle[id as usize]);
            for raw in rec.fields {
                let name_ref = heap.duplicate_str(&raw.name);
                let value_ref = heap.duplicate_str(&raw.value);
                let capacity = heap.field_block(handle).capacity();
                let slot = heap
                    .field_block_mut(handle)
                    .alloc_slot()
                    .ok_or(HeapError::BufferOverflow(capacity))?;
                let next_dup = raw
                    .next_dup_block
                    .map(|id| (id_to_handle[id as usize], raw.next_dup_slot));
                let field: &mut MimeField = heap.field_block_mut(handle).slot_mut(slot);
                field.wks_idx = raw.wks_idx as i16;
                field.name = name_ref;
                field.value = value_ref;
                field.next_dup = next_dup;
                field.readiness = readiness_from_tag(raw.readiness);
                field.flags = crate::mime::FieldFlags(raw.flags);
            }
            heap.field_block_mut(handle).next = next;
        }
        _ => unreachable!("obj_type and record kind always match"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmarshal_rejects_field_with_zero_length_name() {
        let mut w = Writer::new();
        w.u32(MAGIC);
        w.u32(VERSION);
        w.u32(1); // one object
        w.u8(ObjType::FieldBlock as u8);
        w.opt_id(None); // next
        w.u16(16); // capacity
        w.u16(1); // field count
        w.i32(-1); // wks_idx
        w.bytes(b""); // zero-length name
        w.bytes(b"value");
        w.opt_id(None); // next_dup
        w.u16(0);
        w.u8(0); // readiness
        w.u8(0); // flags

        let err = unmarshal(&w.buf).unwrap_err();
        assert!(matches!(err, HeapError::ZeroLengthObject(_)));
    }
}
