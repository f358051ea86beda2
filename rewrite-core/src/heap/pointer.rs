//! Pointer heap: chained fixed-capacity blocks of typed objects.
//!
//! Mirrors `HdrHeap`'s `HdrHeapBlock` chain (`original_source/proxy/hdrs/
//! HdrHeap.h`), minus the raw-pointer/byte-packing trick — objects here are
//! Rust values addressed by [`ObjHandle`], and a block never grows past the
//! capacity it was created with, so an `ObjHandle` stays valid for the life
//! of the heap even as new blocks are appended.

use crate::error::HeapError;
use crate::mime::{FieldBlock, MimeHeader};
use crate::url::Url;

/// First block holds this many slots; each subsequent block doubles.
const FIRST_BLOCK_CAPACITY: usize = 16;

/// Object-type tag, mirrors `HdrHeapObjType` in `HdrHeap.h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ObjType {
    Empty = 0,
    Url = 2,
    HttpHeader = 3,
    MimeHeader = 4,
    FieldBlock = 5,
}

impl ObjType {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(ObjType::Empty),
            2 => Some(ObjType::Url),
            3 => Some(ObjType::HttpHeader),
            4 => Some(ObjType::MimeHeader),
            5 => Some(ObjType::FieldBlock),
            _ => None,
        }
    }
}

/// A typed object living in the pointer heap.
#[derive(Debug, Clone)]
pub enum Object {
    Empty,
    Url(Url),
    MimeHeader(MimeHeader),
    FieldBlock(FieldBlock),
}

impl Object {
    pub fn obj_type(&self) -> ObjType {
        match self {
            Object::Empty => ObjType::Empty,
            Object::Url(_) => ObjType::Url,
            Object::MimeHeader(_) => ObjType::MimeHeader,
            Object::FieldBlock(_) => ObjType::FieldBlock,
        }
    }
}

/// Address of an object inside a [`PointerHeap`]: which block, which slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjHandle {
    pub(crate) block: u32,
    pub(crate) slot: u32,
}

struct Block {
    slots: Vec<Object>,
    capacity: usize,
}

impl Block {
    fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
        }
    }

    fn is_full(&self) -> bool {
        self.slots.len() >= self.capacity
    }
}

pub struct PointerHeap {
    blocks: Vec<Block>,
    live_count: usize,
}

impl PointerHeap {
    pub fn new() -> Self {
        Self {
            blocks: vec![Block::new(FIRST_BLOCK_CAPACITY)],
            live_count: 0,
        }
    }

    pub fn allocate(&mut self, obj: Object) -> Result<ObjHandle, HeapError> {
        let requested = std::mem::size_of_val(&obj);
        if requested > crate::heap::MAX_OBJ_SIZE {
            return Err(HeapError::AllocTooBig {
                requested,
                max: crate::heap::MAX_OBJ_SIZE,
            });
        }
        if self.blocks.last().unwrap().is_full() {
            let next_capacity = self.blocks.last().unwrap().capacity * 2;
            self.blocks.push(Block::new(next_capacity));
        }
        let block_idx = self.blocks.len() - 1;
        let block = &mut self.blocks[block_idx];
        let slot = block.slots.len();
        block.slots.push(obj);
        self.live_count += 1;
        Ok(ObjHandle {
            block: block_idx as u32,
            slot: slot as u32,
        })
    }

    pub fn deallocate(&mut self, handle: ObjHandle) {
        if let Some(slot) = self.slot_mut(handle) {
            if !matches!(slot, Object::Empty) {
                *slot = Object::Empty;
                self.live_count = self.live_count.saturating_sub(1);
            }
        }
    }

    fn slot_mut(&mut self, handle: ObjHandle) -> Option<&mut Object> {
        self.blocks
            .get_mut(handle.block as usize)
            .and_then(|b| b.slots.get_mut(handle.slot as usize))
    }

    pub fn get(&self, handle: ObjHandle) -> &Object {
        &self.blocks[handle.block as usize].slots[handle.slot as usize]
    }

    pub fn get_mut(&mut self, handle: ObjHandle) -> &mut Object {
        &mut self.blocks[handle.block as usize].slots[handle.slot as usize]
    }

    pub fn live_count(&self) -> usize {
        self.live_count
    }

    /// Iterates over every live object with its handle, in block order —
    /// used by marshal and by string-heap coalesce to rewrite `StrRef`s.
    pub fn iter_live(&self) -> impl Iterator<Item = (ObjHandle, &Object)> {
        self.blocks.iter().enumerate().flat_map(|(bi, block)| {
            block
                .slots
                .iter()
                .enumerate()
                .filter(|(_, o)| !matches!(o, Object::Empty))
                .map(move |(si, o)| {
                    (
                        ObjHandle {
                            block: bi as u32,
                            slot: si as u32,
                        },
                        o,
                    )
                })
        })
    }

    pub fn iter_live_mut(&mut self) -> impl Iterator<Item = (ObjHandle, &mut Object)> {
        self.blocks.iter_mut().enumerate().flat_map(|(bi, block)| {
            block
                .slots
                .iter_mut()
                .enumerate()
                .filter(|(_, o)| !matches!(o, Object::Empty))
                .map(move |(si, o)| {
                    (
                        ObjHandle {
                            block: bi as u32,
                            slot: si as u32,
                        },
                        o,
                    )
                })
        })
    }
}

impl Default for PointerHeap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_chain_doubles_and_handles_stay_valid() {
        let mut heap = PointerHeap::new();
        let mut handles = Vec::new();
        for _ in 0..40 {
            handles.push(heap.allocate(Object::MimeHeader(MimeHeader::new())).unwrap());
        }
        assert!(heap.blocks.len() > 1);
        for h in handles {
            assert!(matches!(heap.get(h), Object::MimeHeader(_)));
        }
    }

    #[test]
    fn deallocate_marks_empty_without_shifting_others() {
        let mut heap = PointerHeap::new();
        let a = heap.allocate(Object::MimeHeader(MimeHeader::new())).unwrap();
        let b = heap.allocate(Object::MimeHeader(MimeHeader::new())).unwrap();
        heap.deallocate(a);
        assert!(matches!(heap.get(a), Object::Empty));
        assert!(matches!(heap.get(b), Object::MimeHeader(_)));
        assert_eq!(heap.live_count(), 1);
    }
}
