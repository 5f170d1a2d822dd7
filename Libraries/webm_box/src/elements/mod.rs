// This module contains the element types used to write live WebM.
//
// The following submodules are included:
//
// - `generic`: the serialized `EbmlElement` and the `WebmElement` trait shared by the typed elements.
// - `tags`: the element IDs (`MatroskaTag`).
// - `ebml_header`: the EBML header that opens the file (doc type "webm").
// - `info`: the Segment Information element (timestamp scale, application names).
// - `track_entry`: track definitions, including the Opus identification header.
// - `cluster`: the opening of a live Cluster with its base timestamp.
// - `simple_block`: one encoded frame with its relative timestamp and flags.
// - `segment`: the live Segment wrapping Info, Tracks and the first Cluster.

pub mod cluster;
pub mod ebml_header;
pub mod generic;
pub mod info;
pub mod segment;
pub mod simple_block;
pub mod tags;
pub mod track_entry;
