//! Crypto provider: AES-256-CBC for content-key wrapping, RSA-OAEP for
//! document-key transport, X.509 parsing for recipient certificates.

pub mod aes;
pub mod rsa;
pub mod x509;
