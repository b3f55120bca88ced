//! Core library for CPIX (Content Protection Information Exchange)
//! documents: the in-memory document model, the XML codec over it, and the
//! crypto pipeline that wraps content keys for a set of recipients.
//!
//! A document is assembled imperatively and serialized with
//! [`CpixMessage::to_xml`]; when recipients are present, every content key
//! goes onto the wire encrypted under a per-document key that is itself
//! RSA-wrapped for each recipient certificate. The receiving side parses
//! with [`CpixMessage::from_xml`] and unwraps with
//! [`CpixMessage::decrypt_with`].
//!
//! ```no_run
//! use cpix_core::{ContentKey, CpixMessage};
//!
//! # fn main() -> cpix_core::Result<()> {
//! let mut key = ContentKey::default();
//! key.kid = cpix_core::util::guid_to_bytes("bd5adf51-cf04-410f-aac3-ec63a69e929e")?;
//! key.set_key_value(cpix_core::util::base64_to_bytes("3iv9lYwafpe0uEmxDc6PSw==")?);
//!
//! let mut message = CpixMessage::new();
//! message.add_content_key(key)?;
//! let xml = message.to_xml()?;
//! # Ok(())
//! # }
//! ```

mod content_key;
pub mod crypto;
mod drm_system;
mod element;
mod error;
mod key_period;
mod message;
mod recipient;
mod usage_rule;
pub mod util;
pub mod xml;

pub use content_key::ContentKey;
pub use drm_system::DrmSystem;
pub use error::{Error, Result};
pub use key_period::KeyPeriod;
pub use message::CpixMessage;
pub use recipient::Recipient;
pub use usage_rule::{AudioFilter, BitrateFilter, UsageRule, VideoFilter};
pub use xml::{SchemaValidator, XmlNode};
