//! DeliveryData: a receiving entity identified by its X.509 certificate,
//! carrying the document key wrapped under that certificate's public key.

use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::crypto;
use crate::element::Element;
use crate::error::{Error, Result};
use crate::util::{base64_to_bytes, bytes_to_base64};
use crate::xml::XmlNode;

const AES256_CBC_URI: &str = "http://www.w3.org/2001/04/xmlenc#aes256-cbc";
const RSA_OAEP_URI: &str = "http://www.w3.org/2001/04/xmlenc#rsa-oaep-mgf1p";

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Recipient {
    pub id: Option<String>,
    /// DER-encoded X.509 certificate of the recipient.
    pub delivery_key: Vec<u8>,
    encrypted_document_key: Vec<u8>,
}

impl Recipient {
    /// The RSA-OAEP ciphertext of the document key under this recipient's
    /// public key. Empty until the serialization pipeline wraps the key, or
    /// populated from the wire on parse.
    pub fn encrypted_document_key(&self) -> &[u8] {
        &self.encrypted_document_key
    }

    /// Extracts the RSA public key from the recipient's certificate.
    pub(crate) fn public_key(&self) -> Result<RsaPublicKey> {
        crypto::x509::certificate_public_key(&self.delivery_key)
    }

    /// Wraps the clear document key for this recipient, storing the
    /// ciphertext.
    pub(crate) fn wrap_document_key(&mut self, document_key: &[u8]) -> Result<()> {
        let public_key = self.public_key()?;
        self.encrypted_document_key = crypto::rsa::oaep_encrypt(&public_key, document_key)?;
        Ok(())
    }

    /// Unwraps the stored document-key ciphertext with the given private
    /// key.
    pub(crate) fn unwrap_document_key(&self, private_key: &RsaPrivateKey) -> Result<Vec<u8>> {
        if self.encrypted_document_key.is_empty() {
            return Err(Error::CryptoFailure(
                "recipient carries no encrypted document key".into(),
            ));
        }
        crypto::rsa::oaep_decrypt(private_key, &self.encrypted_document_key)
    }

    #[cfg(test)]
    pub(crate) fn set_encrypted_document_key(&mut self, key: Vec<u8>) {
        self.encrypted_document_key = key;
    }
}

impl Element for Recipient {
    const LIST_NAME: &'static str = "DeliveryDataList";

    fn to_node(&self) -> Option<XmlNode> {
        if self.encrypted_document_key.is_empty() {
            return None;
        }

        let mut root = XmlNode::new("", "DeliveryData");
        if let Some(id) = &self.id {
            root.add_attribute("id", id);
        }

        let mut cert = XmlNode::new("ds", "X509Certificate");
        cert.set_content(&bytes_to_base64(&self.delivery_key));
        let mut x509_data = XmlNode::new("ds", "X509Data");
        x509_data.add_child(cert);
        let mut delivery_key = XmlNode::new("", "DeliveryKey");
        delivery_key.add_child(x509_data);

        let mut document_key = XmlNode::new("", "DocumentKey");
        document_key.add_attribute("Algorithm", AES256_CBC_URI);

        let mut method = XmlNode::new("enc", "EncryptionMethod");
        method.add_attribute("Algorithm", RSA_OAEP_URI);
        let mut cipher_value = XmlNode::new("enc", "CipherValue");
        cipher_value.set_content(&bytes_to_base64(&self.encrypted_document_key));
        let mut cipher_data = XmlNode::new("enc", "CipherData");
        cipher_data.add_child(cipher_value);

        let mut encrypted_value = XmlNode::new("pskc", "EncryptedValue");
        encrypted_value.add_child(method);
        encrypted_value.add_child(cipher_data);
        let mut secret = XmlNode::new("pskc", "Secret");
        secret.add_child(encrypted_value);
        let mut data = XmlNode::new("", "Data");
        data.add_child(secret);
        document_key.add_child(data);

        root.add_child(delivery_key);
        root.add_child(document_key);

        Some(root)
    }

    fn from_node(node: &mut XmlNode) -> Result<Self> {
        let mut recipient = Recipient::default();
        if let Some(id) = node.attribute("id") {
            recipient.id = Some(id.to_string());
        }

        let cert = node
            .take_descendant(&["DeliveryKey", "X509Data", "X509Certificate"])
            .ok_or_else(|| Error::XmlMalformed("DeliveryData without X509Certificate".into()))?;
        recipient.delivery_key = base64_to_bytes(cert.content())
            .map_err(|_| Error::XmlMalformed("DeliveryData certificate is not base64".into()))?;

        let cipher = node
            .take_descendant(&[
                "DocumentKey",
                "Data",
                "Secret",
                "EncryptedValue",
                "CipherData",
                "CipherValue",
            ])
            .ok_or_else(|| Error::XmlMalformed("DeliveryData without DocumentKey value".into()))?;
        recipient.encrypted_document_key = base64_to_bytes(cipher.content())
            .map_err(|_| Error::XmlMalformed("DeliveryData document key is not base64".into()))?;

        Ok(recipient)
    }
}
