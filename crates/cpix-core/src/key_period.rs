//! ContentKeyPeriod: a key rotation period, named either by index or by an
//! explicit start/end interval. Referenced from usage rules through `id`.

use crate::element::Element;
use crate::error::{Error, Result};
use crate::xml::XmlNode;

#[derive(Debug, Clone, PartialEq)]
enum PeriodForm {
    Index(u32),
    /// Timestamps in xs:dateTime format `CCYY-MM-DDThh:mm:ss[Z|(+|-)hh:mm]`,
    /// not validated here.
    Interval {
        start: String,
        end: String,
    },
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct KeyPeriod {
    pub id: Option<String>,
    form: Option<PeriodForm>,
}

impl KeyPeriod {
    /// Switches to the index form, clearing any interval.
    pub fn set_index(&mut self, index: u32) {
        self.form = Some(PeriodForm::Index(index));
    }

    /// Switches to the interval form, clearing any index.
    pub fn set_interval(&mut self, start: &str, end: &str) {
        self.form = Some(PeriodForm::Interval {
            start: start.to_string(),
            end: end.to_string(),
        });
    }

    pub fn is_set(&self) -> bool {
        self.form.is_some()
    }
}

impl Element for KeyPeriod {
    const LIST_NAME: &'static str = "ContentKeyPeriodList";

    fn to_node(&self) -> Option<XmlNode> {
        let form = self.form.as_ref()?;

        let mut root = XmlNode::new("", "ContentKeyPeriod");
        if let Some(id) = &self.id {
            root.add_attribute("id", id);
        }
        match form {
            PeriodForm::Index(index) => root.add_attribute("index", &index.to_string()),
            PeriodForm::Interval { start, end } => {
                root.add_attribute("start", start);
                root.add_attribute("end", end);
            }
        }
        Some(root)
    }

    fn from_node(node: &mut XmlNode) -> Result<Self> {
        let mut period = KeyPeriod::default();
        if let Some(id) = node.attribute("id") {
            period.id = Some(id.to_string());
        }

        if let Some(index) = node.attribute("index") {
            let index = index
                .parse::<u32>()
                .map_err(|_| Error::XmlMalformed(format!("bad ContentKeyPeriod index: {index}")))?;
            period.set_index(index);
            return Ok(period);
        }
        if let (Some(start), Some(end)) = (node.attribute("start"), node.attribute("end")) {
            period.set_interval(start, end);
            return Ok(period);
        }
        Err(Error::XmlMalformed(
            "ContentKeyPeriod needs an index or a start/end pair".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML_INDEX: &str = "<ContentKeyPeriod index=\"3\"/>";
    const XML_INTERVAL: &str =
        "<ContentKeyPeriod start=\"1970-01-01T12:00:00\" end=\"1970-01-01T12:30:00\"/>";

    #[test]
    fn serialize_index_form() {
        let mut period = KeyPeriod::default();
        period.set_index(3);
        assert_eq!(period.serialize().unwrap(), XML_INDEX);
    }

    #[test]
    fn serialize_interval_form() {
        let mut period = KeyPeriod::default();
        period.set_interval("1970-01-01T12:00:00", "1970-01-01T12:30:00");
        assert_eq!(period.serialize().unwrap(), XML_INTERVAL);
    }

    #[test]
    fn deserialize_both_forms() {
        let mut node = XmlNode::parse(XML_INDEX).unwrap();
        let period = KeyPeriod::from_node(&mut node).unwrap();
        assert_eq!(period.serialize().unwrap(), XML_INDEX);

        let mut node = XmlNode::parse(XML_INTERVAL).unwrap();
        let period = KeyPeriod::from_node(&mut node).unwrap();
        assert_eq!(period.serialize().unwrap(), XML_INTERVAL);
    }

    #[test]
    fn switching_forms_is_atomic() {
        let mut period = KeyPeriod::default();
        period.set_index(3);
        period.set_interval("a", "b");
        assert_eq!(
            period.serialize().unwrap(),
            "<ContentKeyPeriod start=\"a\" end=\"b\"/>"
        );
        period.set_index(7);
        assert_eq!(period.serialize().unwrap(), "<ContentKeyPeriod index=\"7\"/>");
    }

    #[test]
    fn unset_period_renders_no_node() {
        assert!(KeyPeriod::default().to_node().is_none());
    }

    #[test]
    fn rejects_empty_and_garbage_forms() {
        let mut node = XmlNode::parse("<ContentKeyPeriod/>").unwrap();
        assert!(KeyPeriod::from_node(&mut node).is_err());
        let mut node = XmlNode::parse("<ContentKeyPeriod index=\"x\"/>").unwrap();
        assert!(KeyPeriod::from_node(&mut node).is_err());
        let mut node = XmlNode::parse("<ContentKeyPeriod start=\"a\"/>").unwrap();
        assert!(KeyPeriod::from_node(&mut node).is_err());
    }
}
