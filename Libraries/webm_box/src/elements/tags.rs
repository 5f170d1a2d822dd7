// Element IDs used when writing live WebM.
//
// IDs keep their length marker bits, exactly as they appear on the wire, so `0x1A45DFA3` is
// written as the four bytes `1A 45 DF A3`. Only the subset needed for a live, append-only
// presentation with one video and one audio track is listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MatroskaTag {
    // EBML header
    Ebml = 0x1A45_DFA3,
    EbmlVersion = 0x4286,
    EbmlReadVersion = 0x42F7,
    EbmlMaxIdLength = 0x42F2,
    EbmlMaxSizeLength = 0x42F3,
    DocType = 0x4282,
    DocTypeVersion = 0x4287,
    DocTypeReadVersion = 0x4285,

    // Segment and segment information
    Segment = 0x1853_8067,
    Info = 0x1549_A966,
    TimestampScale = 0x2A_D7B1,
    MuxingApp = 0x4D80,
    WritingApp = 0x5741,

    // Tracks
    Tracks = 0x1654_AE6B,
    TrackEntry = 0xAE,
    TrackNumber = 0xD7,
    TrackUid = 0x73C5,
    TrackType = 0x83,
    CodecId = 0x86,
    CodecPrivate = 0x63A2,
    Video = 0xE0,
    PixelWidth = 0xB0,
    PixelHeight = 0xBA,
    Audio = 0xE1,
    SamplingFrequency = 0xB5,
    Channels = 0x9F,

    // Clusters
    Cluster = 0x1F43_B675,
    Timestamp = 0xE7,
    SimpleBlock = 0xA3,
}

impl MatroskaTag {
    pub const ALL: [MatroskaTag; 29] = [
        MatroskaTag::Ebml,
        MatroskaTag::EbmlVersion,
        MatroskaTag::EbmlReadVersion,
        MatroskaTag::EbmlMaxIdLength,
        MatroskaTag::EbmlMaxSizeLength,
        MatroskaTag::DocType,
        MatroskaTag::DocTypeVersion,
        MatroskaTag::DocTypeReadVersion,
        MatroskaTag::Segment,
        MatroskaTag::Info,
        MatroskaTag::TimestampScale,
        MatroskaTag::MuxingApp,
        MatroskaTag::WritingApp,
        MatroskaTag::Tracks,
        MatroskaTag::TrackEntry,
        MatroskaTag::TrackNumber,
        MatroskaTag::TrackUid,
        MatroskaTag::TrackType,
        MatroskaTag::CodecId,
        MatroskaTag::CodecPrivate,
        MatroskaTag::Video,
        MatroskaTag::PixelWidth,
        MatroskaTag::PixelHeight,
        MatroskaTag::Audio,
        MatroskaTag::SamplingFrequency,
        MatroskaTag::Channels,
        MatroskaTag::Cluster,
        MatroskaTag::Timestamp,
        MatroskaTag::SimpleBlock,
    ];

    pub fn id(self) -> u32 {
        self as u32
    }

    // The ID bytes as written on the wire, without leading zero bytes.
    pub fn id_bytes(self) -> Vec<u8> {
        let id = self.id();
        let skip = ((id.leading_zeros() / 8) as usize).min(3);
        id.to_be_bytes()[skip..].to_vec()
    }

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|tag| tag.id() == id)
    }

    // Master elements contain other elements rather than a value.
    pub fn is_master(self) -> bool {
        matches!(
            self,
            MatroskaTag::Ebml
                | MatroskaTag::Segment
                | MatroskaTag::Info
                | MatroskaTag::Tracks
                | MatroskaTag::TrackEntry
                | MatroskaTag::Video
                | MatroskaTag::Audio
                | MatroskaTag::Cluster
        )
    }
}
