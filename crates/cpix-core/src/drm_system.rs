//! DRMSystem: vendor signaling payloads for one content key. Each payload
//! field is an opaque byte string, absent when empty.

use crate::element::Element;
use crate::error::{Error, Result};
use crate::util::{base64_to_bytes, bytes_to_base64, bytes_to_guid, guid_to_bytes};
use crate::xml::XmlNode;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct DrmSystem {
    pub id: Option<String>,
    /// Must match the kid of a ContentKey in the same document.
    pub kid: Vec<u8>,
    /// DRM-system UUID, 16 bytes (e.g. Widevine
    /// `edef8ba9-79d6-4ace-a3c8-27dcd51d21ed`).
    pub system_id: Vec<u8>,
    pub pssh: Vec<u8>,
    pub content_protection_data: Vec<u8>,
    pub uri_ext_x_key: Vec<u8>,
    pub hls_signaling_master: Vec<u8>,
    pub hls_signaling_media: Vec<u8>,
    pub smooth_streaming_data: Vec<u8>,
    pub hds_signaling_data: Vec<u8>,
}

fn payload_node(name: &str, data: &[u8]) -> XmlNode {
    let mut node = XmlNode::new("", name);
    node.set_content(&bytes_to_base64(data));
    node
}

impl Element for DrmSystem {
    const LIST_NAME: &'static str = "DRMSystemList";

    fn to_node(&self) -> Option<XmlNode> {
        if self.kid.is_empty() || self.system_id.is_empty() {
            return None;
        }

        let mut root = XmlNode::new("", "DRMSystem");
        if let Some(id) = &self.id {
            root.add_attribute("id", id);
        }
        root.add_attribute("kid", &bytes_to_guid(&self.kid));
        root.add_attribute("systemId", &bytes_to_guid(&self.system_id));

        if !self.pssh.is_empty() {
            root.add_child(payload_node("PSSH", &self.pssh));
        }
        if !self.content_protection_data.is_empty() {
            root.add_child(payload_node(
                "ContentProtectionData",
                &self.content_protection_data,
            ));
        }
        if !self.uri_ext_x_key.is_empty() {
            root.add_child(payload_node("URIExtXKey", &self.uri_ext_x_key));
        }
        if !self.hls_signaling_master.is_empty() {
            let mut node = payload_node("HLSSignalingData", &self.hls_signaling_master);
            node.add_attribute("playlist", "master");
            root.add_child(node);
        }
        if !self.hls_signaling_media.is_empty() {
            let mut node = payload_node("HLSSignalingData", &self.hls_signaling_media);
            node.add_attribute("playlist", "media");
            root.add_child(node);
        }
        if !self.smooth_streaming_data.is_empty() {
            root.add_child(payload_node(
                "SmoothStreamingProtectionHeaderData",
                &self.smooth_streaming_data,
            ));
        }
        if !self.hds_signaling_data.is_empty() {
            root.add_child(payload_node("HDSSignalingData", &self.hds_signaling_data));
        }

        Some(root)
    }

    fn from_node(node: &mut XmlNode) -> Result<Self> {
        let mut drm = DrmSystem::default();
        if let Some(id) = node.attribute("id") {
            drm.id = Some(id.to_string());
        }

        drm.kid = required_guid(node, "kid")?;
        drm.system_id = required_guid(node, "systemId")?;

        if let Some(child) = node.take_child("PSSH") {
            drm.pssh = payload_bytes(&child)?;
        }
        if let Some(child) = node.take_child("ContentProtectionData") {
            drm.content_protection_data = payload_bytes(&child)?;
        }
        if let Some(child) = node.take_child("URIExtXKey") {
            drm.uri_ext_x_key = payload_bytes(&child)?;
        }
        // Both HLS variants share the element name; the playlist attribute
        // tells them apart.
        for child in node.take_children("HLSSignalingData") {
            if child.attribute("playlist") == Some("master") {
                drm.hls_signaling_master = payload_bytes(&child)?;
            } else {
                drm.hls_signaling_media = payload_bytes(&child)?;
            }
        }
        if let Some(child) = node.take_child("SmoothStreamingProtectionHeaderData") {
            drm.smooth_streaming_data = payload_bytes(&child)?;
        }
        if let Some(child) = node.take_child("HDSSignalingData") {
            drm.hds_signaling_data = payload_bytes(&child)?;
        }

        Ok(drm)
    }
}

fn required_guid(node: &XmlNode, attr: &str) -> Result<Vec<u8>> {
    let value = node
        .attribute(attr)
        .ok_or_else(|| Error::XmlMalformed(format!("DRMSystem without {attr}")))?;
    let bytes = guid_to_bytes(value)
        .map_err(|_| Error::XmlMalformed(format!("DRMSystem {attr} is not a GUID: {value}")))?;
    if bytes.len() != 16 {
        return Err(Error::XmlMalformed(format!(
            "DRMSystem {attr} must be 16 bytes: {value}"
        )));
    }
    Ok(bytes)
}

fn payload_bytes(node: &XmlNode) -> Result<Vec<u8>> {
    base64_to_bytes(node.content()).map_err(|_| {
        Error::XmlMalformed(format!("DRMSystem {} payload is not base64", node.name()))
    })
}
