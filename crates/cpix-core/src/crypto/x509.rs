use rsa::RsaPublicKey;
use x509_parser::prelude::*;

use crate::error::{Error, Result};

/// Parses a DER-encoded X.509 certificate and extracts the subject's RSA
/// public key.
pub fn certificate_public_key(der: &[u8]) -> Result<RsaPublicKey> {
    if der.is_empty() {
        return Err(Error::InvalidInput("empty certificate".into()));
    }
    let (_, cert) = X509Certificate::from_der(der)
        .map_err(|e| Error::CryptoFailure(format!("bad X.509 certificate: {e}")))?;
    // The raw SubjectPublicKeyInfo is a DER SPKI, exactly what the RSA
    // loader expects.
    super::rsa::public_key_from_der(cert.public_key().raw)
}
