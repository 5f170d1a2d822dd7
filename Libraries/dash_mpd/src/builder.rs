use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;
use thiserror::Error;

use crate::{DASH_NAMESPACE, LIVE_PROFILES, ROLE_SCHEME};

/// Segment timestamps and durations are expressed in milliseconds.
pub const MPD_TIMESCALE: u64 = 1000;

#[derive(Debug, Error)]
pub enum MpdError {
    #[error("manifest has no adaptation sets")]
    NoAdaptationSets,

    #[error("segment duration must be positive")]
    ZeroSegmentDuration,

    #[error("failed to write manifest XML: {0}")]
    Write(String),

    #[error("manifest is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// One adaptation set with a single representation
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptationSetDef {
    pub content_type: String,
    pub mime_type: String,
    pub representation_id: String,
    pub codecs: String,
    pub bandwidth: Option<u64>,
    pub initialization: String,
    pub media: String,
    pub start_number: u64,
}

impl AdaptationSetDef {
    /// `codec` is the DASH codecs string, `vp8` or `vp9`.
    pub fn webm_video(codec: &str, bandwidth: Option<u64>) -> Self {
        Self {
            content_type: "video".to_string(),
            mime_type: "video/webm".to_string(),
            representation_id: "video_track".to_string(),
            codecs: codec.to_string(),
            bandwidth,
            initialization: "/video_init.webm".to_string(),
            media: "/video$Number$.webm".to_string(),
            start_number: 0,
        }
    }

    pub fn webm_audio(bandwidth: Option<u64>) -> Self {
        Self {
            content_type: "audio".to_string(),
            mime_type: "audio/webm".to_string(),
            representation_id: "audio_track".to_string(),
            codecs: "opus".to_string(),
            bandwidth,
            initialization: "/audio_init.webm".to_string(),
            media: "/audio$Number$.webm".to_string(),
            start_number: 0,
        }
    }
}

/// Live MPD builder
#[derive(Debug, Clone)]
pub struct MpdBuilder {
    pub publish_time: DateTime<Utc>,
    pub availability_start_time: DateTime<Utc>,
    pub segment_duration_ms: u64,
    pub min_buffer_time_ms: Option<u64>,
    pub base_url: Option<String>,
    pub adaptation_sets: Vec<AdaptationSetDef>,
}

impl MpdBuilder {
    pub fn live() -> Self {
        let now = Utc::now();
        Self {
            publish_time: now,
            availability_start_time: now,
            segment_duration_ms: 1000,
            min_buffer_time_ms: None,
            base_url: Some("/".to_string()),
            adaptation_sets: vec![],
        }
    }

    /**
     * Set the availability start time for the MPD.
     * Segment N becomes available at this time plus (N + 1) segment durations.
     */
    pub fn availability_start(mut self, time: DateTime<Utc>) -> Self {
        self.availability_start_time = time;
        self
    }

    pub fn publish_time(mut self, time: DateTime<Utc>) -> Self {
        self.publish_time = time;
        self
    }

    /**
     * Set the segment duration in milliseconds.
     * This is the rotation interval of the segment writer and is also advertised
     * as the maximum segment duration.
     */
    pub fn segment_duration_ms(mut self, duration_ms: u64) -> Self {
        self.segment_duration_ms = duration_ms;
        self
    }

    /**
     * Set the minimum buffer time in milliseconds.
     * The player buffers at least this much media before starting playback.
     */
    pub fn min_buffer_time_ms(mut self, buffer_ms: u64) -> Self {
        self.min_buffer_time_ms = Some(buffer_ms);
        self
    }

    pub fn base_url(mut self, base_url: Option<&str>) -> Self {
        self.base_url = base_url.map(str::to_string);
        self
    }

    pub fn add_adaptation_set(mut self, adaptation_set: AdaptationSetDef) -> Self {
        self.adaptation_sets.push(adaptation_set);
        self
    }

    /**
     * Build the MPD XML string.
     * Writes the XML declaration, the dynamic MPD root, one Period starting at zero
     * and one AdaptationSet per added definition.
     */
    pub fn build_xml_string(&self) -> Result<String, MpdError> {
        if self.adaptation_sets.is_empty() {
            return Err(MpdError::NoAdaptationSets);
        }
        if self.segment_duration_ms == 0 {
            return Err(MpdError::ZeroSegmentDuration);
        }

        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        write(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

        let mut mpd = BytesStart::new("MPD");
        mpd.push_attribute(("xmlns", DASH_NAMESPACE));
        mpd.push_attribute(("type", "dynamic"));
        mpd.push_attribute(("profiles", LIVE_PROFILES));
        mpd.push_attribute(("publishTime", format_time(&self.publish_time).as_str()));
        mpd.push_attribute((
            "availabilityStartTime",
            format_time(&self.availability_start_time).as_str(),
        ));
        mpd.push_attribute((
            "maxSegmentDuration",
            format_duration_ms(self.segment_duration_ms).as_str(),
        ));
        if let Some(v) = self.min_buffer_time_ms {
            mpd.push_attribute(("minBufferTime", format_duration_ms(v).as_str()));
        }
        write(&mut writer, Event::Start(mpd))?;

        if let Some(base_url) = &self.base_url {
            write(&mut writer, Event::Start(BytesStart::new("BaseURL")))?;
            write(&mut writer, Event::Text(BytesText::new(base_url)))?;
            write(&mut writer, Event::End(BytesEnd::new("BaseURL")))?;
        }

        let mut period = BytesStart::new("Period");
        period.push_attribute(("id", "live"));
        period.push_attribute(("start", "PT0S"));
        write(&mut writer, Event::Start(period))?;

        for set in &self.adaptation_sets {
            self.write_adaptation_set(&mut writer, set)?;
        }

        write(&mut writer, Event::End(BytesEnd::new("Period")))?;
        write(&mut writer, Event::End(BytesEnd::new("MPD")))?;

        let result = writer.into_inner().into_inner();
        Ok(String::from_utf8(result)?)
    }

    fn write_adaptation_set(
        &self,
        writer: &mut Writer<Cursor<Vec<u8>>>,
        set: &AdaptationSetDef,
    ) -> Result<(), MpdError> {
        let mut adaptation = BytesStart::new("AdaptationSet");
        adaptation.push_attribute(("mimeType", set.mime_type.as_str()));
        adaptation.push_attribute(("contentType", set.content_type.as_str()));
        write(writer, Event::Start(adaptation))?;

        let mut role = BytesStart::new("Role");
        role.push_attribute(("schemeIdUri", ROLE_SCHEME));
        role.push_attribute(("value", "main"));
        write(writer, Event::Empty(role))?;

        let mut template = BytesStart::new("SegmentTemplate");
        template.push_attribute(("timescale", MPD_TIMESCALE.to_string().as_str()));
        template.push_attribute(("duration", self.segment_duration_ms.to_string().as_str()));
        template.push_attribute(("initialization", set.initialization.as_str()));
        template.push_attribute(("media", set.media.as_str()));
        template.push_attribute(("startNumber", set.start_number.to_string().as_str()));
        write(writer, Event::Empty(template))?;

        let mut representation = BytesStart::new("Representation");
        representation.push_attribute(("id", set.representation_id.as_str()));
        representation.push_attribute(("codecs", set.codecs.as_str()));
        if let Some(bandwidth) = set.bandwidth {
            representation.push_attribute(("bandwidth", bandwidth.to_string().as_str()));
        }
        write(writer, Event::Empty(representation))?;

        write(writer, Event::End(BytesEnd::new("AdaptationSet")))
    }
}

fn write(writer: &mut Writer<Cursor<Vec<u8>>>, event: Event<'_>) -> Result<(), MpdError> {
    writer
        .write_event(event)
        .map_err(|e| MpdError::Write(e.to_string()))
}

/// ISO-8601 UTC timestamp with second precision, e.g. `2024-05-01T12:00:00Z`.
pub fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// ISO-8601 duration in seconds: `PT1S`, `PT1.5S`, `PT0.25S`.
pub fn format_duration_ms(duration_ms: u64) -> String {
    let seconds = duration_ms / 1000;
    let millis = duration_ms % 1000;
    if millis == 0 {
        format!("PT{}S", seconds)
    } else {
        let fraction = format!("{:03}", millis);
        format!("PT{}.{}S", seconds, fraction.trim_end_matches('0'))
    }
}
