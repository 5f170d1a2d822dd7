use std::hash::{Hash, Hasher};

use crate::{format_capped_bytes, format_element_id};
use crate::vint::{encode_size, encode_uint, UNKNOWN_SIZE};

use super::tags::MatroskaTag;

// The `EbmlElement` struct is the serialized form of every WebM element.
// On the wire it is `id ++ size ++ value`, where `size` is a VINT holding `value.len()`,
// or the reserved unknown-size marker for live Segments and Clusters.
//
// Fields:
// - `tag`: which element this is.
// - `value`: the payload bytes (for master elements, the concatenated children).
// - `size`: the encoded data-size field, always derived from `value` at construction.
//
// Elements are never mutated in place: a different value means a new element, so the size
// field cannot go stale. Equality and hashing only look at `(tag, value)`.
#[derive(Clone)]
pub struct EbmlElement {
    tag: MatroskaTag,
    value: Vec<u8>,
    size: Vec<u8>,
}

impl EbmlElement {
    pub fn new(tag: MatroskaTag, value: Vec<u8>) -> Self {
        let size = encode_size(value.len());
        Self { tag, value, size }
    }

    // A master element whose length is not known up front (live Segment, Cluster).
    pub fn with_unknown_size(tag: MatroskaTag, value: Vec<u8>) -> Self {
        Self {
            tag,
            value,
            size: UNKNOWN_SIZE.to_vec(),
        }
    }

    pub fn uint(tag: MatroskaTag, value: u64) -> Self {
        Self::new(tag, encode_uint(value))
    }

    // Matroska string elements are printable ASCII.
    pub fn ascii(tag: MatroskaTag, value: &str) -> Self {
        let bytes = value
            .chars()
            .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
            .collect();
        Self::new(tag, bytes)
    }

    pub fn float(tag: MatroskaTag, value: f32) -> Self {
        Self::new(tag, value.to_bits().to_be_bytes().to_vec())
    }

    pub fn master(tag: MatroskaTag, children: &[EbmlElement]) -> Self {
        Self::new(tag, concat_elements(children))
    }

    pub fn tag(&self) -> MatroskaTag {
        self.tag
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn size_field(&self) -> &[u8] {
        &self.size
    }

    pub fn has_unknown_size(&self) -> bool {
        self.size == UNKNOWN_SIZE
    }

    // Total serialized length: ID bytes + size field + payload.
    pub fn element_size(&self) -> usize {
        self.tag.id_bytes().len() + self.size.len() + self.value.len()
    }

    pub fn write_element(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&self.tag.id_bytes());
        buffer.extend_from_slice(&self.size);
        buffer.extend_from_slice(&self.value);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(self.element_size());
        self.write_element(&mut buffer);
        buffer
    }
}

impl PartialEq for EbmlElement {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag && self.value == other.value
    }
}

impl Eq for EbmlElement {}

impl Hash for EbmlElement {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tag.hash(state);
        self.value.hash(state);
    }
}

impl std::fmt::Debug for EbmlElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let size = if self.has_unknown_size() {
            "unknown".to_string()
        } else {
            self.value.len().to_string()
        };
        f.debug_struct("EbmlElement")
            .field("tag", &self.tag)
            .field("id", &format_element_id(self.tag.id()))
            .field("size", &size)
            .field("value", &format_capped_bytes(&self.value))
            .finish()
    }
}

pub fn concat_elements(elements: &[EbmlElement]) -> Vec<u8> {
    let total = elements.iter().map(EbmlElement::element_size).sum();
    let mut buffer = Vec::with_capacity(total);
    for element in elements {
        element.write_element(&mut buffer);
    }
    buffer
}

// The `WebmElement` trait is the common interface of the typed elements in this module.
//
// Required Methods:
// - `tag`: the element ID.
// - `payload`: the serialized value (children for master elements).
//
// Provided Methods:
// - `is_streaming`: true for elements written with the unknown-size marker.
// - `to_element` / `write_element`: serialization through `EbmlElement`.
pub trait WebmElement {
    fn tag(&self) -> MatroskaTag;

    fn payload(&self) -> Vec<u8>;

    fn is_streaming(&self) -> bool {
        false
    }

    fn to_element(&self) -> EbmlElement {
        if self.is_streaming() {
            EbmlElement::with_unknown_size(self.tag(), self.payload())
        } else {
            EbmlElement::new(self.tag(), self.payload())
        }
    }

    fn write_element(&self, buffer: &mut Vec<u8>) {
        self.to_element().write_element(buffer);
    }
}
