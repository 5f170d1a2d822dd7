use super::cluster::ClusterHeader;
use super::generic::{concat_elements, EbmlElement, WebmElement};
use super::info::Info;
use super::tags::MatroskaTag;
use super::track_entry::TrackEntry;

// The `Segment` struct is the top-level container of a live WebM init segment.
// It is declared with unknown size since a live stream never announces its length.
//
// Fields:
// - `info`: timestamp scale and application names.
// - `tracks`: one or two track entries.
// - `cluster`: the placeholder Cluster that closes the init segment; media segments keep
//   appending blocks and Clusters after it.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub info: Info,
    pub tracks: Vec<TrackEntry>,
    pub cluster: ClusterHeader,
}

impl WebmElement for Segment {
    fn tag(&self) -> MatroskaTag {
        MatroskaTag::Segment
    }

    fn payload(&self) -> Vec<u8> {
        let entries: Vec<EbmlElement> = self.tracks.iter().map(WebmElement::to_element).collect();
        concat_elements(&[
            self.info.to_element(),
            EbmlElement::master(MatroskaTag::Tracks, &entries),
            self.cluster.to_element(),
        ])
    }

    fn is_streaming(&self) -> bool {
        true
    }
}
