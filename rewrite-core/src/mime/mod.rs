//! MIME header model: fields, field blocks, the cooked Cache-Control /
//! Pragma cache, and the header block wire parser.

pub mod cooked;
pub mod field;
pub mod header;
pub mod parser;

pub use field::{FieldBlock, FieldFlags, MimeField, Readiness, FIELD_BLOCK_SLOTS, SLOTNUM_UNKNOWN};
pub use header::{
    add_header, attach_field, create, detach_field, dup_chain, field_find, fields_count,
    iter_all_fields, rm_header, set_header, FieldAddr, MimeHeader,
};
pub use parser::{parse, print, MAX_FIELD_LEN};
