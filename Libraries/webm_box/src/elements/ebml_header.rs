use super::generic::{concat_elements, EbmlElement, WebmElement};
use super::tags::MatroskaTag;

// The `EbmlHeader` struct represents the EBML header that opens every WebM file.
// It tells a reader which EBML version and document type follow.
//
// Fields:
// - `version` / `read_version`: EBML version used and the minimum a parser needs.
// - `max_id_length`: longest element ID in the file (4 for Matroska).
// - `max_size_length`: longest size field in the file (8 bytes).
// - `doc_type`: "webm".
// - `doc_type_version` / `doc_type_read_version`: WebM version used and the minimum a reader needs.
#[derive(Debug, Clone, PartialEq)]
pub struct EbmlHeader {
    pub version: u64,
    pub read_version: u64,
    pub max_id_length: u64,
    pub max_size_length: u64,
    pub doc_type: String,
    pub doc_type_version: u64,
    pub doc_type_read_version: u64,
}

impl Default for EbmlHeader {
    fn default() -> Self {
        EbmlHeader {
            version: 1,
            read_version: 1,
            max_id_length: 4,
            max_size_length: 8,
            doc_type: "webm".to_string(),
            doc_type_version: 2,
            doc_type_read_version: 2,
        }
    }
}

impl WebmElement for EbmlHeader {
    fn tag(&self) -> MatroskaTag {
        MatroskaTag::Ebml
    }

    fn payload(&self) -> Vec<u8> {
        concat_elements(&[
            EbmlElement::uint(MatroskaTag::EbmlVersion, self.version),
            EbmlElement::uint(MatroskaTag::EbmlReadVersion, self.read_version),
            EbmlElement::uint(MatroskaTag::EbmlMaxIdLength, self.max_id_length),
            EbmlElement::uint(MatroskaTag::EbmlMaxSizeLength, self.max_size_length),
            EbmlElement::ascii(MatroskaTag::DocType, &self.doc_type),
            EbmlElement::uint(MatroskaTag::DocTypeVersion, self.doc_type_version),
            EbmlElement::uint(MatroskaTag::DocTypeReadVersion, self.doc_type_read_version),
        ])
    }
}
