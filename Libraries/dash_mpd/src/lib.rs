//! MPEG-DASH manifest generation for live WebM presentations.
//!
//! The manifest is `type="dynamic"` with one `AdaptationSet` per track. Each set uses a
//! number-based `SegmentTemplate`, so players compute segment names from the wall clock
//! (`availabilityStartTime` plus `duration` per segment) instead of re-reading the MPD.

pub mod builder;

pub use builder::{AdaptationSetDef, MpdBuilder, MpdError};

pub const DASH_NAMESPACE: &str = "urn:mpeg:dash:schema:mpd:2011";
pub const LIVE_PROFILES: &str = "urn:mpeg:dash:profile:isoff-live:2011,http://dashif.org/guidelines/";
pub const ROLE_SCHEME: &str = "urn:mpeg:dash:role:2011";
