//! Fixed-width, order-preserving byte encoding used as a B+ tree key.
//!
//! The original implementation generates one `GenericKey<N>` C++ template
//! per supported width (`{4, 8, 16, 32, 64}` bytes); this port collapses
//! that into a single `IndexKey` whose width is chosen once, at tree
//! construction time, from that same size set (see
//! [`IndexKey::width_for`]). Byte-lexicographic comparison of the encoded
//! form must agree with the natural ordering of the wrapped column values,
//! so integers and floats are order-preserving-encoded rather than stored
//! as raw little-endian bytes.

use crate::record::{DataType, Field};

/// The compile-time-sized widths the original offered as template
/// instantiations; a tree picks the smallest that fits its key columns.
pub const SUPPORTED_WIDTHS: [usize; 5] = [4, 8, 16, 32, 64];

/// An encoded, comparable B+ tree key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct IndexKey(Vec<u8>);

impl IndexKey {
    /// Smallest supported width that can hold `needed` bytes.
    pub fn width_for(needed: usize) -> usize {
        SUPPORTED_WIDTHS.into_iter().find(|&w| w >= needed).unwrap_or(*SUPPORTED_WIDTHS.last().unwrap())
    }

    /// Encode `fields` (already projected to an index's key schema, in
    /// order) into a key padded/truncated to exactly `width` bytes.
    pub fn encode(fields: &[Field], width: usize) -> Self {
        let mut out = Vec::with_capacity(width);
        for field in fields {
            match field {
                Field::Int(v) => out.extend_from_slice(&encode_i32(*v)),
                Field::Float(v) => out.extend_from_slice(&encode_f32(*v)),
                Field::Char(s) => {
                    let data_type = field.data_type();
                    let len = match data_type {
                        DataType::Char(n) => n as usize,
                        _ => s.len(),
                    };
                    let mut bytes = s.clone().into_bytes();
                    bytes.resize(len, 0);
                    out.extend_from_slice(&bytes);
                }
                Field::Null(_) => {
                    // NULL keys sort before every non-null value of their type.
                    out.extend_from_slice(&[0u8; 4]);
                }
            }
        }
        out.resize(width, 0);
        IndexKey(out)
    }

    /// Raw encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Build a key from raw bytes already of the tree's chosen width.
    pub fn from_raw(bytes: &[u8]) -> Self {
        IndexKey(bytes.to_vec())
    }
}

fn encode_i32(v: i32) -> [u8; 4] {
    ((v as u32) ^ 0x8000_0000).to_be_bytes()
}

fn encode_f32(v: f32) -> [u8; 4] {
    let bits = v.to_bits();
    let flipped = if bits & 0x8000_0000 != 0 { !bits } else { bits | 0x8000_0000 };
    flipped.to_be_bytes()
}
