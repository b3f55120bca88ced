//! CPIXMessage: the document aggregate. Owns the five element lists,
//! enforces the cross-list invariants, and runs the crypto pipeline during
//! serialization and decryption.

use tracing::error;
use zeroize::Zeroizing;

use crate::content_key::ContentKey;
use crate::crypto;
use crate::crypto::aes::AesCbc;
use crate::drm_system::DrmSystem;
use crate::element::ElementList;
use crate::error::{Error, Result};
use crate::key_period::KeyPeriod;
use crate::recipient::Recipient;
use crate::usage_rule::UsageRule;
use crate::util::random_bytes;
use crate::xml::{SchemaValidator, XmlNode};

const DOCUMENT_KEY_LEN: usize = 32;

/// A whole CPIX document.
///
/// Created empty, populated through the `add_*` operations, then serialized
/// with [`to_xml`](CpixMessage::to_xml) or filled from the wire with
/// [`from_xml`](CpixMessage::from_xml). Content keys parsed in encrypted
/// form stay encrypted until [`decrypt_with`](CpixMessage::decrypt_with) is
/// called with a matching private key.
#[derive(Debug, Default)]
pub struct CpixMessage {
    pub id: Option<String>,
    pub content_id: Option<String>,
    /// Accepted on parse for interoperability; never serialized (reserved).
    pub name: Option<String>,
    document_key: Option<Zeroizing<Vec<u8>>>,
    recipients: ElementList<Recipient>,
    content_keys: ElementList<ContentKey>,
    drm_systems: ElementList<DrmSystem>,
    usage_rules: ElementList<UsageRule>,
    key_periods: ElementList<KeyPeriod>,
}

impl CpixMessage {
    pub fn new() -> Self {
        CpixMessage::default()
    }

    /// Serializes the document, materializing the crypto pipeline:
    ///
    /// 1. draws a fresh 32-byte document key when recipients exist and none
    ///    is set yet,
    /// 2. RSA-wraps the document key for every recipient that does not carry
    ///    it yet,
    /// 3. AES-CBC-wraps every still-clear content key under the document
    ///    key (explicit IV when present, zero IV otherwise).
    ///
    /// Any wrap or encrypt failure aborts with an error; no partially
    /// protected document is produced.
    pub fn to_xml(&mut self) -> Result<String> {
        let mut root = XmlNode::new("", "CPIX");
        root.add_attribute("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance");
        root.add_attribute("xmlns:xsd", "http://www.w3.org/2001/XMLSchema");
        root.add_attribute("xmlns", "urn:dashif:org:cpix");
        root.add_attribute("xmlns:ds", "http://www.w3.org/2000/09/xmldsig#");
        root.add_attribute("xmlns:enc", "http://www.w3.org/2001/04/xmlenc#");
        root.add_attribute("xmlns:pskc", "urn:ietf:params:xml:ns:keyprov:pskc");
        if let Some(content_id) = &self.content_id {
            root.add_attribute("contentId", content_id);
        }

        if !self.recipients.is_empty() && self.document_key.is_none() {
            self.document_key = Some(Zeroizing::new(random_bytes(DOCUMENT_KEY_LEN)));
        }

        if let Some(document_key) = &self.document_key {
            for recipient in self.recipients.iter_mut() {
                if recipient.encrypted_document_key().is_empty() {
                    recipient.wrap_document_key(document_key)?;
                }
            }

            for key in self.content_keys.iter_mut() {
                if key.is_encrypted() {
                    continue;
                }
                let mut aes = AesCbc::new(document_key).map_err(|e| {
                    error!("content key encryption failed: {e}");
                    e
                })?;
                if !key.explicit_iv.is_empty() {
                    aes.set_iv(&key.explicit_iv)?;
                }
                let encrypted = aes.encrypt(key.key_value());
                key.set_encrypted_key_value(encrypted);
            }
        }

        for node in [
            self.recipients.to_node(),
            self.content_keys.to_node(),
            self.drm_systems.to_node(),
            self.key_periods.to_node(),
            self.usage_rules.to_node(),
        ]
        .into_iter()
        .flatten()
        {
            root.add_child(node);
        }

        Ok(root.to_xml())
    }

    /// Builds a message from an existing CPIX document. Missing lists are
    /// not an error; they stay empty.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let mut root = XmlNode::parse(xml)?;
        if root.name() != "CPIX" {
            return Err(Error::XmlMalformed(format!(
                "expected CPIX root element, found {}",
                root.name()
            )));
        }

        let mut message = CpixMessage::new();
        if let Some(id) = root.attribute("id") {
            message.id = Some(id.to_string());
        }
        if let Some(content_id) = root.attribute("contentId") {
            message.content_id = Some(content_id.to_string());
        }
        if let Some(name) = root.attribute("name") {
            message.name = Some(name.to_string());
        }

        message
            .recipients
            .from_node(root.take_child("DeliveryDataList"))?;
        message
            .content_keys
            .from_node(root.take_child("ContentKeyList"))?;
        message
            .drm_systems
            .from_node(root.take_child("DRMSystemList"))?;
        message
            .key_periods
            .from_node(root.take_child("ContentKeyPeriodList"))?;
        message
            .usage_rules
            .from_node(root.take_child("ContentKeyUsageRuleList"))?;

        Ok(message)
    }

    /// Decrypts all content keys with the given DER-encoded RSA private key.
    ///
    /// The key must match one of the document's recipients (by modulus);
    /// that recipient's wrapped document key is unwrapped and used to
    /// AES-CBC-unwrap every content key in place.
    pub fn decrypt_with(&mut self, private_key_der: &[u8]) -> Result<()> {
        let private_key = crypto::rsa::private_key_from_der(private_key_der).map_err(|e| {
            error!("invalid private key: {e}");
            e
        })?;

        let mut document_key = None;
        for recipient in self.recipients.iter() {
            let public_key = recipient.public_key()?;
            if crypto::rsa::modulus_matches(&public_key, &private_key) {
                document_key = Some(Zeroizing::new(recipient.unwrap_document_key(&private_key)?));
                break;
            }
        }
        let Some(document_key) = document_key else {
            error!("provided RSA private key does not match any recipient of the document");
            return Err(Error::NoMatchingRecipient);
        };

        for key in self.content_keys.iter_mut() {
            let mut aes = AesCbc::new(&document_key)?;
            if !key.explicit_iv.is_empty() {
                aes.set_iv(&key.explicit_iv)?;
            }
            let plain = aes.decrypt(key.key_value()).map_err(|e| {
                error!("failure to decrypt content keys");
                e
            })?;
            key.set_key_value(plain);
        }

        self.document_key = Some(document_key);
        Ok(())
    }

    /// Adds a content key; requires a 16-byte kid and a non-empty value.
    pub fn add_content_key(&mut self, key: ContentKey) -> Result<()> {
        if key.kid.len() != 16 {
            return Err(Error::InvalidInput("content key kid must be 16 bytes".into()));
        }
        if key.key_value().is_empty() {
            return Err(Error::InvalidInput("content key has no value".into()));
        }
        self.content_keys.push(key);
        Ok(())
    }

    /// Adds a content key together with DRM systems and usage rules for it,
    /// adopting the key's kid onto each.
    ///
    /// Not transactional: a rejection mid-sequence leaves the elements added
    /// so far in place.
    pub fn add_content_key_with(
        &mut self,
        key: ContentKey,
        drm_systems: Vec<DrmSystem>,
        rules: Vec<UsageRule>,
    ) -> Result<()> {
        let kid = key.kid.clone();
        self.add_content_key(key)?;

        for mut drm in drm_systems {
            drm.kid = kid.clone();
            self.add_drm_system(drm)?;
        }
        for mut rule in rules {
            rule.kid = kid.clone();
            self.add_usage_rule(rule)?;
        }
        Ok(())
    }

    /// Adds a DRM system; its kid must match a content key already in the
    /// message.
    pub fn add_drm_system(&mut self, drm: DrmSystem) -> Result<()> {
        if self.find_content_key(&drm.kid).is_none() {
            return Err(Error::StructuralViolation(
                "DRM system references a kid with no matching content key".into(),
            ));
        }
        self.drm_systems.push(drm);
        Ok(())
    }

    /// Adds a usage rule; its kid must match a content key already in the
    /// message.
    pub fn add_usage_rule(&mut self, rule: UsageRule) -> Result<()> {
        if self.find_content_key(&rule.kid).is_none() {
            return Err(Error::StructuralViolation(
                "usage rule references a kid with no matching content key".into(),
            ));
        }
        self.usage_rules.push(rule);
        Ok(())
    }

    /// Adds a key period; it must be in one of its two valid shapes.
    pub fn add_key_period(&mut self, period: KeyPeriod) -> Result<()> {
        if !period.is_set() {
            return Err(Error::StructuralViolation(
                "key period has neither an index nor an interval".into(),
            ));
        }
        self.key_periods.push(period);
        Ok(())
    }

    /// Adds a recipient; its delivery key (DER certificate) must be present.
    pub fn add_recipient(&mut self, recipient: Recipient) -> Result<()> {
        if recipient.delivery_key.is_empty() {
            return Err(Error::InvalidInput("recipient has no delivery key".into()));
        }
        self.recipients.push(recipient);
        Ok(())
    }

    pub fn find_content_key(&self, kid: &[u8]) -> Option<&ContentKey> {
        if kid.is_empty() {
            return None;
        }
        self.content_keys.iter().find(|key| key.kid == kid)
    }

    pub fn content_keys(&self) -> &[ContentKey] {
        self.content_keys.as_slice()
    }

    pub fn drm_systems(&self) -> &[DrmSystem] {
        self.drm_systems.as_slice()
    }

    pub fn usage_rules(&self) -> &[UsageRule] {
        self.usage_rules.as_slice()
    }

    pub fn key_periods(&self) -> &[KeyPeriod] {
        self.key_periods.as_slice()
    }

    pub fn recipients(&self) -> &[Recipient] {
        self.recipients.as_slice()
    }

    /// Validates a serialized document against the caller-supplied schema
    /// validator.
    pub fn validate_xml(xml: &str, validator: &dyn SchemaValidator) -> bool {
        validator.validate(xml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::{base64_to_bytes, guid_to_bytes};

    const EMPTY_DOCUMENT: &str = "<CPIX \
xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
xmlns:xsd=\"http://www.w3.org/2001/XMLSchema\" \
xmlns=\"urn:dashif:org:cpix\" \
xmlns:ds=\"http://www.w3.org/2000/09/xmldsig#\" \
xmlns:enc=\"http://www.w3.org/2001/04/xmlenc#\" \
xmlns:pskc=\"urn:ietf:params:xml:ns:keyprov:pskc\"/>";

    const EMPTY_DOCUMENT_CONTENT_ID: &str = "<CPIX \
xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
xmlns:xsd=\"http://www.w3.org/2001/XMLSchema\" \
xmlns=\"urn:dashif:org:cpix\" \
xmlns:ds=\"http://www.w3.org/2000/09/xmldsig#\" \
xmlns:enc=\"http://www.w3.org/2001/04/xmlenc#\" \
xmlns:pskc=\"urn:ietf:params:xml:ns:keyprov:pskc\" \
contentId=\"encryptedvideo\"/>";

    const KID: &str = "bd5adf51-cf04-410f-aac3-ec63a69e929e";
    const KEY_VALUE: &str = "3iv9lYwafpe0uEmxDc6PSw==";

    fn clear_key(kid: &str) -> ContentKey {
        let mut key = ContentKey::default();
        key.kid = guid_to_bytes(kid).unwrap();
        key.set_key_value(base64_to_bytes(KEY_VALUE).unwrap());
        key
    }

    #[test]
    fn serialize_empty_message() {
        let mut message = CpixMessage::new();
        assert_eq!(message.to_xml().unwrap(), EMPTY_DOCUMENT);
    }

    #[test]
    fn serialize_message_with_content_id() {
        let mut message = CpixMessage::new();
        message.content_id = Some("encryptedvideo".to_string());
        assert_eq!(message.to_xml().unwrap(), EMPTY_DOCUMENT_CONTENT_ID);
    }

    #[test]
    fn load_empty_document() {
        let message = CpixMessage::from_xml(EMPTY_DOCUMENT).unwrap();
        assert!(message.content_keys().is_empty());
        assert!(message.recipients().is_empty());
    }

    #[test]
    fn load_rejects_foreign_root() {
        assert!(CpixMessage::from_xml("<NotCpix/>").is_err());
    }

    #[test]
    fn add_content_key_requires_kid_and_value() {
        let mut message = CpixMessage::new();
        assert!(message.add_content_key(ContentKey::default()).is_err());

        let mut no_value = ContentKey::default();
        no_value.kid = guid_to_bytes(KID).unwrap();
        assert!(message.add_content_key(no_value).is_err());

        assert!(message.add_content_key(clear_key(KID)).is_ok());
    }

    #[test]
    fn drm_system_requires_matching_content_key() {
        let mut message = CpixMessage::new();
        let mut drm = DrmSystem::default();
        drm.kid = guid_to_bytes(KID).unwrap();
        drm.system_id = guid_to_bytes("edef8ba9-79d6-4ace-a3c8-27dcd51d21ed").unwrap();
        assert!(message.add_drm_system(drm.clone()).is_err());

        message.add_content_key(clear_key(KID)).unwrap();
        assert!(message.add_drm_system(drm).is_ok());
    }

    #[test]
    fn usage_rule_requires_matching_content_key() {
        let mut message = CpixMessage::new();
        let mut rule = UsageRule::default();
        rule.kid = guid_to_bytes(KID).unwrap();
        assert!(message.add_usage_rule(rule.clone()).is_err());

        message.add_content_key(clear_key(KID)).unwrap();
        assert!(message.add_usage_rule(rule).is_ok());
    }

    #[test]
    fn key_period_must_have_a_shape() {
        let mut message = CpixMessage::new();
        assert!(message.add_key_period(KeyPeriod::default()).is_err());
        let mut period = KeyPeriod::default();
        period.set_index(1);
        assert!(message.add_key_period(period).is_ok());
    }

    #[test]
    fn recipient_requires_delivery_key() {
        let mut message = CpixMessage::new();
        assert!(message.add_recipient(Recipient::default()).is_err());
    }

    #[test]
    fn adopting_add_assigns_kid_to_associates() {
        let mut message = CpixMessage::new();
        let mut drm = DrmSystem::default();
        drm.system_id = guid_to_bytes("edef8ba9-79d6-4ace-a3c8-27dcd51d21ed").unwrap();
        let rule = UsageRule::default();
        message
            .add_content_key_with(clear_key(KID), vec![drm], vec![rule])
            .unwrap();
        let kid = guid_to_bytes(KID).unwrap();
        assert_eq!(message.drm_systems()[0].kid, kid);
        assert_eq!(message.usage_rules()[0].kid, kid);
    }

    #[test]
    fn find_content_key_by_kid() {
        let mut message = CpixMessage::new();
        message.add_content_key(clear_key(KID)).unwrap();
        let kid = guid_to_bytes(KID).unwrap();
        assert!(message.find_content_key(&kid).is_some());
        assert!(message.find_content_key(&[]).is_none());
        assert!(message
            .find_content_key(&guid_to_bytes("d2920429-87ab-41e6-a4c5-a8c836b6312e").unwrap())
            .is_none());
    }
}
