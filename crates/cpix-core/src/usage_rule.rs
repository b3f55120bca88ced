//! ContentKeyUsageRule: maps one content key to a media context through
//! label, video, audio, bitrate, and key-period filters.

use tracing::warn;

use crate::element::Element;
use crate::error::{Error, Result};
use crate::util::{bytes_to_guid, guid_to_bytes};
use crate::xml::XmlNode;

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct VideoFilter {
    pub min_pixels: Option<u32>,
    pub max_pixels: Option<u32>,
    pub hdr: bool,
    pub wcg: bool,
    pub min_fps: Option<u32>,
    pub max_fps: Option<u32>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct AudioFilter {
    pub min_channels: Option<u32>,
    pub max_channels: Option<u32>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct BitrateFilter {
    pub min_bitrate: Option<u32>,
    pub max_bitrate: Option<u32>,
}

fn range_valid(min: Option<u32>, max: Option<u32>) -> bool {
    match (min, max) {
        (Some(min), Some(max)) => min <= max,
        _ => true,
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct UsageRule {
    pub id: Option<String>,
    /// Must match the kid of a ContentKey in the same document.
    pub kid: Vec<u8>,
    pub intended_track_type: Option<String>,
    label_filters: Vec<String>,
    video_filters: Vec<VideoFilter>,
    audio_filters: Vec<AudioFilter>,
    bitrate_filters: Vec<BitrateFilter>,
    key_period_filter_ids: Vec<String>,
}

impl UsageRule {
    pub fn add_label_filter(&mut self, label: &str) {
        self.label_filters.push(label.to_string());
    }

    /// Rejects filters where a set min exceeds a set max; the filter is not
    /// appended in that case.
    pub fn add_video_filter(&mut self, filter: VideoFilter) -> Result<()> {
        if !range_valid(filter.min_pixels, filter.max_pixels)
            || !range_valid(filter.min_fps, filter.max_fps)
        {
            warn!("invalid video filter parameters, filter not added");
            return Err(Error::StructuralViolation(
                "video filter min exceeds max".into(),
            ));
        }
        self.video_filters.push(filter);
        Ok(())
    }

    pub fn add_audio_filter(&mut self, filter: AudioFilter) -> Result<()> {
        if !range_valid(filter.min_channels, filter.max_channels) {
            warn!("invalid audio filter parameters, filter not added");
            return Err(Error::StructuralViolation(
                "audio filter min exceeds max".into(),
            ));
        }
        self.audio_filters.push(filter);
        Ok(())
    }

    pub fn add_bitrate_filter(&mut self, filter: BitrateFilter) -> Result<()> {
        if !range_valid(filter.min_bitrate, filter.max_bitrate) {
            warn!("invalid bitrate filter parameters, filter not added");
            return Err(Error::StructuralViolation(
                "bitrate filter min exceeds max".into(),
            ));
        }
        self.bitrate_filters.push(filter);
        Ok(())
    }

    /// The supplied id should reference a KeyPeriod in the same document.
    pub fn add_key_period_filter(&mut self, period_id: &str) {
        self.key_period_filter_ids.push(period_id.to_string());
    }

    pub fn video_filters(&self) -> &[VideoFilter] {
        &self.video_filters
    }

    pub fn audio_filters(&self) -> &[AudioFilter] {
        &self.audio_filters
    }

    pub fn bitrate_filters(&self) -> &[BitrateFilter] {
        &self.bitrate_filters
    }
}

fn push_range_attr(node: &mut XmlNode, name: &str, value: Option<u32>) {
    if let Some(value) = value {
        node.add_attribute(name, &value.to_string());
    }
}

fn parse_range_attr(node: &XmlNode, name: &str) -> Result<Option<u32>> {
    match node.attribute(name) {
        Some(value) => value
            .parse::<u32>()
            .map(Some)
            .map_err(|_| Error::XmlMalformed(format!("bad {name} attribute: {value}"))),
        None => Ok(None),
    }
}

impl Element for UsageRule {
    const LIST_NAME: &'static str = "ContentKeyUsageRuleList";

    fn to_node(&self) -> Option<XmlNode> {
        if self.kid.is_empty() {
            return None;
        }

        let mut root = XmlNode::new("", "ContentKeyUsageRule");
        if let Some(id) = &self.id {
            root.add_attribute("id", id);
        }
        root.add_attribute("kid", &bytes_to_guid(&self.kid));
        if let Some(track_type) = &self.intended_track_type {
            root.add_attribute("intendedTrackType", track_type);
        }

        for period_id in &self.key_period_filter_ids {
            let mut node = XmlNode::new("", "KeyPeriodFilter");
            node.add_attribute("periodId", period_id);
            root.add_child(node);
        }
        for label in &self.label_filters {
            let mut node = XmlNode::new("", "LabelFilter");
            node.add_attribute("label", label);
            root.add_child(node);
        }
        for filter in &self.video_filters {
            let mut node = XmlNode::new("", "VideoFilter");
            push_range_attr(&mut node, "minPixels", filter.min_pixels);
            push_range_attr(&mut node, "maxPixels", filter.max_pixels);
            if filter.hdr {
                node.add_attribute("hdr", "true");
            }
            if filter.wcg {
                node.add_attribute("wcg", "true");
            }
            push_range_attr(&mut node, "minFps", filter.min_fps);
            push_range_attr(&mut node, "maxFps", filter.max_fps);
            root.add_child(node);
        }
        for filter in &self.audio_filters {
            let mut node = XmlNode::new("", "AudioFilter");
            push_range_attr(&mut node, "minChannels", filter.min_channels);
            push_range_attr(&mut node, "maxChannels", filter.max_channels);
            root.add_child(node);
        }
        for filter in &self.bitrate_filters {
            let mut node = XmlNode::new("", "BitrateFilter");
            push_range_attr(&mut node, "minBitrate", filter.min_bitrate);
            push_range_attr(&mut node, "maxBitrate", filter.max_bitrate);
            root.add_child(node);
        }

        Some(root)
    }

    fn from_node(node: &mut XmlNode) -> Result<Self> {
        let mut rule = UsageRule::default();
        if let Some(id) = node.attribute("id") {
            rule.id = Some(id.to_string());
        }

        let kid = node
            .attribute("kid")
            .ok_or_else(|| Error::XmlMalformed("ContentKeyUsageRule without kid".into()))?;
        rule.kid = guid_to_bytes(kid).map_err(|_| {
            Error::XmlMalformed(format!("ContentKeyUsageRule kid is not a GUID: {kid}"))
        })?;
        if rule.kid.len() != 16 {
            return Err(Error::XmlMalformed(format!(
                "ContentKeyUsageRule kid must be 16 bytes: {kid}"
            )));
        }

        if let Some(track_type) = node.attribute("intendedTrackType") {
            rule.intended_track_type = Some(track_type.to_string());
        }

        // Filters are pushed without the add-time range check; parse accepts
        // what the document contains.
        while let Some(child) = node.take_child("KeyPeriodFilter") {
            rule.key_period_filter_ids
                .push(child.attribute("periodId").unwrap_or_default().to_string());
        }
        while let Some(child) = node.take_child("LabelFilter") {
            rule.label_filters
                .push(child.attribute("label").unwrap_or_default().to_string());
        }
        while let Some(child) = node.take_child("VideoFilter") {
            rule.video_filters.push(VideoFilter {
                min_pixels: parse_range_attr(&child, "minPixels")?,
                max_pixels: parse_range_attr(&child, "maxPixels")?,
                hdr: child.attribute("hdr") == Some("true"),
                wcg: child.attribute("wcg") == Some("true"),
                min_fps: parse_range_attr(&child, "minFps")?,
                max_fps: parse_range_attr(&child, "maxFps")?,
            });
        }
        while let Some(child) = node.take_child("AudioFilter") {
            rule.audio_filters.push(AudioFilter {
                min_channels: parse_range_attr(&child, "minChannels")?,
                max_channels: parse_range_attr(&child, "maxChannels")?,
            });
        }
        while let Some(child) = node.take_child("BitrateFilter") {
            rule.bitrate_filters.push(BitrateFilter {
                min_bitrate: parse_range_attr(&child, "minBitrate")?,
                max_bitrate: parse_range_attr(&child, "maxBitrate")?,
            });
        }

        Ok(rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::hex_to_bytes;

    const KID: &str = "bd5adf51cf04410faac3ec63a69e929e";

    fn good_rule() -> UsageRule {
        let mut rule = UsageRule::default();
        rule.kid = hex_to_bytes(KID).unwrap();
        rule.intended_track_type = Some("UHD".to_string());
        rule.add_key_period_filter("id");
        rule.add_label_filter("label");
        rule.add_video_filter(VideoFilter {
            min_pixels: Some(1),
            max_pixels: Some(2),
            hdr: true,
            wcg: true,
            min_fps: Some(1),
            max_fps: Some(2),
        })
        .unwrap();
        rule.add_audio_filter(AudioFilter {
            min_channels: Some(1),
            max_channels: Some(2),
        })
        .unwrap();
        rule.add_bitrate_filter(BitrateFilter {
            min_bitrate: Some(1),
            max_bitrate: Some(2),
        })
        .unwrap();
        rule
    }

    const GOOD_XML: &str = "<ContentKeyUsageRule \
kid=\"bd5adf51-cf04-410f-aac3-ec63a69e929e\" \
intendedTrackType=\"UHD\"><KeyPeriodFilter periodId=\"id\"/><LabelFilter \
label=\"label\"/><VideoFilter minPixels=\"1\" maxPixels=\"2\" hdr=\"true\" \
wcg=\"true\" minFps=\"1\" maxFps=\"2\"/><AudioFilter minChannels=\"1\" \
maxChannels=\"2\"/><BitrateFilter minBitrate=\"1\" \
maxBitrate=\"2\"/></ContentKeyUsageRule>";

    #[test]
    fn serialize_usage_rule() {
        assert_eq!(good_rule().serialize().unwrap(), GOOD_XML);
    }

    #[test]
    fn deserialize_usage_rule() {
        let mut node = XmlNode::parse(GOOD_XML).unwrap();
        let rule = UsageRule::from_node(&mut node).unwrap();
        assert_eq!(rule, good_rule());
        assert_eq!(rule.serialize().unwrap(), GOOD_XML);
    }

    #[test]
    fn unset_fields_are_omitted() {
        let mut rule = UsageRule::default();
        rule.kid = hex_to_bytes(KID).unwrap();
        rule.add_video_filter(VideoFilter {
            max_pixels: Some(10),
            ..VideoFilter::default()
        })
        .unwrap();
        assert_eq!(
            rule.serialize().unwrap(),
            "<ContentKeyUsageRule kid=\"bd5adf51-cf04-410f-aac3-ec63a69e929e\">\
<VideoFilter maxPixels=\"10\"/></ContentKeyUsageRule>"
        );
    }

    #[test]
    fn invalid_ranges_are_rejected_at_add_time() {
        let mut rule = UsageRule::default();
        rule.kid = hex_to_bytes(KID).unwrap();
        assert!(rule
            .add_video_filter(VideoFilter {
                min_pixels: Some(10),
                max_pixels: Some(1),
                ..VideoFilter::default()
            })
            .is_err());
        assert!(rule
            .add_audio_filter(AudioFilter {
                min_channels: Some(6),
                max_channels: Some(2),
            })
            .is_err());
        assert!(rule
            .add_bitrate_filter(BitrateFilter {
                min_bitrate: Some(4_000_000),
                max_bitrate: Some(1),
            })
            .is_err());
        assert!(rule.video_filters().is_empty());
        assert!(!rule.serialize().unwrap().contains("Filter"));
    }

    #[test]
    fn open_ranges_are_accepted() {
        let mut rule = UsageRule::default();
        rule.kid = hex_to_bytes(KID).unwrap();
        assert!(rule
            .add_video_filter(VideoFilter {
                min_pixels: Some(10),
                ..VideoFilter::default()
            })
            .is_ok());
    }

    #[test]
    fn parse_accepts_what_the_document_contains() {
        // min > max on the wire parses; validation applies to the add
        // methods only.
        let xml = "<ContentKeyUsageRule kid=\"bd5adf51-cf04-410f-aac3-ec63a69e929e\">\
<VideoFilter minPixels=\"10\" maxPixels=\"1\"/></ContentKeyUsageRule>";
        let mut node = XmlNode::parse(xml).unwrap();
        let rule = UsageRule::from_node(&mut node).unwrap();
        assert_eq!(rule.video_filters().len(), 1);
    }

    #[test]
    fn rule_without_kid_renders_no_node() {
        assert!(UsageRule::default().to_node().is_none());
    }
}
