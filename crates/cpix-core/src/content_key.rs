//! ContentKey: a media encryption key, carried either in the clear or
//! wrapped under the document key.

use crate::element::Element;
use crate::error::{Error, Result};
use crate::util::{base64_to_bytes, bytes_to_base64, bytes_to_guid, guid_to_bytes};
use crate::xml::XmlNode;

const AES256_CBC_URI: &str = "http://www.w3.org/2001/04/xmlenc#aes256-cbc";

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ContentKey {
    pub id: Option<String>,
    /// Key identifier, 16 bytes, unique within a document.
    pub kid: Vec<u8>,
    /// Optional 16-byte IV for the CBC wrap; the zero IV is used when empty.
    pub explicit_iv: Vec<u8>,
    key_value: Vec<u8>,
    is_encrypted: bool,
}

impl ContentKey {
    /// Sets the clear key value. It is encrypted in place during document
    /// serialization when at least one recipient is present.
    pub fn set_key_value(&mut self, value: Vec<u8>) {
        self.is_encrypted = false;
        self.key_value = value;
    }

    pub(crate) fn set_encrypted_key_value(&mut self, value: Vec<u8>) {
        self.is_encrypted = true;
        self.key_value = value;
    }

    pub fn key_value(&self) -> &[u8] {
        &self.key_value
    }

    /// True when `key_value` is ciphertext under the document key.
    pub fn is_encrypted(&self) -> bool {
        self.is_encrypted
    }
}

impl Element for ContentKey {
    const LIST_NAME: &'static str = "ContentKeyList";

    fn to_node(&self) -> Option<XmlNode> {
        if self.key_value.is_empty() || self.kid.is_empty() {
            return None;
        }

        let mut root = XmlNode::new("", "ContentKey");
        if let Some(id) = &self.id {
            root.add_attribute("id", id);
        }
        root.add_attribute("kid", &bytes_to_guid(&self.kid));

        let value = if self.is_encrypted {
            let mut value = XmlNode::new("pskc", "EncryptedValue");

            let mut method = XmlNode::new("enc", "EncryptionMethod");
            method.add_attribute("Algorithm", AES256_CBC_URI);

            let mut cipher_value = XmlNode::new("enc", "CipherValue");
            cipher_value.set_content(&bytes_to_base64(&self.key_value));
            let mut cipher_data = XmlNode::new("enc", "CipherData");
            cipher_data.add_child(cipher_value);

            value.add_child(method);
            value.add_child(cipher_data);
            if !self.explicit_iv.is_empty() {
                root.add_attribute("explicitIV", &bytes_to_base64(&self.explicit_iv));
            }
            value
        } else {
            let mut value = XmlNode::new("pskc", "PlainValue");
            value.set_content(&bytes_to_base64(&self.key_value));
            value
        };

        let mut secret = XmlNode::new("pskc", "Secret");
        secret.add_child(value);
        let mut data = XmlNode::new("", "Data");
        data.add_child(secret);
        root.add_child(data);

        Some(root)
    }

    fn from_node(node: &mut XmlNode) -> Result<Self> {
        let mut key = ContentKey::default();
        if let Some(id) = node.attribute("id") {
            key.id = Some(id.to_string());
        }

        let kid = node
            .attribute("kid")
            .ok_or_else(|| Error::XmlMalformed("ContentKey without kid".into()))?;
        key.kid = guid_to_bytes(kid)
            .map_err(|_| Error::XmlMalformed(format!("ContentKey kid is not a GUID: {kid}")))?;
        if key.kid.len() != 16 {
            return Err(Error::XmlMalformed(format!(
                "ContentKey kid must be 16 bytes: {kid}"
            )));
        }

        if let Some(iv) = node.attribute("explicitIV") {
            key.explicit_iv = base64_to_bytes(iv)
                .map_err(|_| Error::XmlMalformed("ContentKey explicitIV is not base64".into()))?;
        }

        let mut secret = node
            .take_descendant(&["Data", "Secret"])
            .ok_or_else(|| Error::XmlMalformed("ContentKey without Data/Secret".into()))?;

        if let Some(plain) = secret.take_child("PlainValue") {
            key.key_value = base64_to_bytes(plain.content())
                .map_err(|_| Error::XmlMalformed("ContentKey value is not base64".into()))?;
            key.is_encrypted = false;
            return Ok(key);
        }

        let cipher = secret
            .take_descendant(&["EncryptedValue", "CipherData", "CipherValue"])
            .ok_or_else(|| {
                Error::XmlMalformed("ContentKey carries neither plain nor encrypted value".into())
            })?;
        key.key_value = base64_to_bytes(cipher.content())
            .map_err(|_| Error::XmlMalformed("ContentKey value is not base64".into()))?;
        key.is_encrypted = true;
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW_KID: &str = "bd5adf51cf04410faac3ec63a69e929e";
    const DASHED_KID: &str = "bd5adf51-cf04-410f-aac3-ec63a69e929e";
    const KEY_VALUE: &str = "3iv9lYwafpe0uEmxDc6PSw==";
    const ENCRYPTED_KEY_VALUE: &str = "ZqZ6HrtExnFkiaf9E2OLMF7nD9L3sdzEzRObm7YiST0=";

    const XML_CLEAR: &str = "<ContentKey \
kid=\"bd5adf51-cf04-410f-aac3-ec63a69e929e\"><Data><pskc:Secret><pskc:\
PlainValue>3iv9lYwafpe0uEmxDc6PSw==</pskc:PlainValue></pskc:Secret></\
Data></ContentKey>";

    const XML_ENCRYPTED: &str = "<ContentKey \
kid=\"bd5adf51-cf04-410f-aac3-ec63a69e929e\"><Data><pskc:Secret><pskc:\
EncryptedValue><enc:EncryptionMethod \
Algorithm=\"http://www.w3.org/2001/04/xmlenc#aes256-cbc\"/\
><enc:CipherData><enc:CipherValue>\
ZqZ6HrtExnFkiaf9E2OLMF7nD9L3sdzEzRObm7YiST0=</enc:CipherValue></\
enc:CipherData></pskc:EncryptedValue></pskc:Secret></Data></ContentKey>";

    const XML_CLEAR_NS: &str = "<ContentKey \
xmlns:enc=\"http://www.w3.org/2001/04/xmlenc#\" \
xmlns:pskc=\"urn:ietf:params:xml:ns:keyprov:pskc\" \
kid=\"bd5adf51-cf04-410f-aac3-ec63a69e929e\"><Data><pskc:Secret><pskc:\
PlainValue>3iv9lYwafpe0uEmxDc6PSw==</pskc:PlainValue></pskc:Secret></\
Data></ContentKey>";

    const XML_ENCRYPTED_NS: &str = "<ContentKey \
xmlns:enc=\"http://www.w3.org/2001/04/xmlenc#\" \
xmlns:pskc=\"urn:ietf:params:xml:ns:keyprov:pskc\" \
kid=\"bd5adf51-cf04-410f-aac3-ec63a69e929e\"><Data><pskc:Secret><pskc:\
EncryptedValue><enc:EncryptionMethod \
Algorithm=\"http://www.w3.org/2001/04/xmlenc#aes256-cbc\"/\
><enc:CipherData><enc:CipherValue>\
ZqZ6HrtExnFkiaf9E2OLMF7nD9L3sdzEzRObm7YiST0=</enc:CipherValue></\
enc:CipherData></pskc:EncryptedValue></pskc:Secret></Data></ContentKey>";

    use crate::util::hex_to_bytes;

    #[test]
    fn serialize_clear() {
        let mut key = ContentKey::default();
        key.kid = hex_to_bytes(RAW_KID).unwrap();
        key.set_key_value(base64_to_bytes(KEY_VALUE).unwrap());
        assert_eq!(key.serialize().unwrap(), XML_CLEAR);
    }

    #[test]
    fn serialize_encrypted() {
        let mut key = ContentKey::default();
        key.kid = hex_to_bytes(RAW_KID).unwrap();
        key.set_encrypted_key_value(base64_to_bytes(ENCRYPTED_KEY_VALUE).unwrap());
        assert_eq!(key.serialize().unwrap(), XML_ENCRYPTED);
    }

    #[test]
    fn deserialize_clear() {
        let mut node = XmlNode::parse(XML_CLEAR_NS).unwrap();
        let key = ContentKey::from_node(&mut node).unwrap();
        assert_eq!(key.kid, guid_to_bytes(DASHED_KID).unwrap());
        assert!(!key.is_encrypted());
        assert_eq!(key.key_value(), base64_to_bytes(KEY_VALUE).unwrap());
        assert_eq!(key.serialize().unwrap(), XML_CLEAR);
    }

    #[test]
    fn deserialize_encrypted() {
        let mut node = XmlNode::parse(XML_ENCRYPTED_NS).unwrap();
        let key = ContentKey::from_node(&mut node).unwrap();
        assert_eq!(key.kid, guid_to_bytes(DASHED_KID).unwrap());
        assert!(key.is_encrypted());
        assert_eq!(
            key.key_value(),
            base64_to_bytes(ENCRYPTED_KEY_VALUE).unwrap()
        );
        assert_eq!(key.serialize().unwrap(), XML_ENCRYPTED);
    }

    #[test]
    fn incomplete_key_renders_no_node() {
        let mut key = ContentKey::default();
        assert!(key.to_node().is_none());
        key.kid = hex_to_bytes(RAW_KID).unwrap();
        assert!(key.to_node().is_none());
        key.set_key_value(base64_to_bytes(KEY_VALUE).unwrap());
        assert!(key.to_node().is_some());
    }

    #[test]
    fn explicit_iv_only_on_encrypted_form() {
        let mut key = ContentKey::default();
        key.kid = hex_to_bytes(RAW_KID).unwrap();
        key.explicit_iv = base64_to_bytes(KEY_VALUE).unwrap();
        key.set_key_value(base64_to_bytes(KEY_VALUE).unwrap());
        assert!(!key.serialize().unwrap().contains("explicitIV"));
        key.set_encrypted_key_value(base64_to_bytes(ENCRYPTED_KEY_VALUE).unwrap());
        assert!(key.serialize().unwrap().contains("explicitIV"));
    }

    #[test]
    fn rejects_missing_value_shapes() {
        let mut node = XmlNode::parse("<ContentKey kid=\"bd5adf51-cf04-410f-aac3-ec63a69e929e\"><Data/></ContentKey>").unwrap();
        assert!(ContentKey::from_node(&mut node).is_err());
        let mut node = XmlNode::parse("<ContentKey kid=\"bd5adf51-cf04-410f-aac3-ec63a69e929e\"><Data><pskc:Secret/></Data></ContentKey>").unwrap();
        assert!(ContentKey::from_node(&mut node).is_err());
    }
}
