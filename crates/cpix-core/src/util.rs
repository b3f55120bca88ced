//! Byte/string conversions shared across the document model: hex, base64,
//! dashed GUIDs, PEM headers, and secure randomness.

use base64::{engine::general_purpose, Engine as _};
use rand::RngCore;

use crate::error::{Error, Result};

pub const CERT_LABEL: &str = "CERTIFICATE";
pub const PUB_KEY_LABEL: &str = "PUBLIC KEY";

pub fn hex_to_bytes(s: &str) -> Result<Vec<u8>> {
    hex::decode(s).map_err(|e| Error::InvalidInput(format!("bad hex string: {e}")))
}

pub fn bytes_to_hex(data: &[u8]) -> String {
    hex::encode(data)
}

pub fn base64_to_bytes(s: &str) -> Result<Vec<u8>> {
    general_purpose::STANDARD
        .decode(s)
        .map_err(|e| Error::InvalidInput(format!("bad base64 string: {e}")))
}

pub fn bytes_to_base64(data: &[u8]) -> String {
    general_purpose::STANDARD.encode(data)
}

/// Parses a key identifier in either dashed (`8-4-4-4-12`) or plain hex form.
pub fn guid_to_bytes(s: &str) -> Result<Vec<u8>> {
    let stripped: String = s.chars().filter(|c| *c != '-').collect();
    hex_to_bytes(&stripped)
}

/// Renders bytes as a lowercase dashed GUID (`8-4-4-4-12` for 16 bytes).
pub fn bytes_to_guid(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2 + 4);
    for (i, b) in data.iter().enumerate() {
        out.push_str(&format!("{b:02x}"));
        if i == 3 || i == 5 || i == 7 || i == 9 {
            out.push('-');
        }
    }
    out
}

/// Removes the PEM armor (first line, last line, all newlines), leaving the
/// bare base64 body.
pub fn strip_pem(pem: &str) -> String {
    pem.lines()
        .filter(|line| !line.starts_with("-----"))
        .collect()
}

/// Wraps a bare base64 body in PEM armor with 64-column lines.
pub fn wrap_pem(label: &str, body: &str) -> String {
    let mut out = format!("-----BEGIN {label}-----\n");
    for chunk in body.as_bytes().chunks(64) {
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        out.push('\n');
    }
    out.push_str(&format!("-----END {label}-----\n"));
    out
}

/// Draws `n` bytes from the OS CSPRNG.
pub fn random_bytes(n: usize) -> Vec<u8> {
    let mut out = vec![0u8; n];
    rand::rngs::OsRng.fill_bytes(&mut out);
    out
}
