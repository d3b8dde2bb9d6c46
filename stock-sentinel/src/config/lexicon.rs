//! Phrase lists used by the classifier.
//!
//! The built-in lists cover the Turkish and English vocabulary of the
//! storefront this tool was first pointed at. They are configuration, not
//! logic: deployments replace them with a JSON file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Configured lexicons for the three signal families.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexiconConfig {
    /// Phrases indicating the item can be ordered.
    #[serde(default = "default_order_phrases")]
    pub order: Vec<String>,
    /// Phrases indicating the item is available.
    #[serde(default = "default_availability_phrases")]
    pub availability: Vec<String>,
    /// Phrases asserting the item is *not* available. These always win.
    #[serde(default = "default_negative_phrases")]
    pub negative_availability: Vec<String>,
}

fn phrases(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn default_order_phrases() -> Vec<String> {
    phrases(&[
        "sipariş ver",
        "order now",
        "rezervasyon",
        "reservation",
        "satın al",
        "buy now",
        "add to cart",
        "sepete ekle",
        "order",
        "sipariş",
    ])
}

fn default_availability_phrases() -> Vec<String> {
    phrases(&[
        "stokta",
        "available",
        "mevcut",
        "in stock",
        "teslim",
        "delivery",
    ])
}

fn default_negative_phrases() -> Vec<String> {
    phrases(&[
        "out of stock",
        "sold out",
        "currently unavailable",
        "waitlist",
        "wait list",
        "pre-order",
        "preorder",
        "notify me",
        "coming soon",
        "stokta yok",
        "tükendi",
        "bekleme listesi",
        "yakında",
    ])
}

impl Default for LexiconConfig {
    fn default() -> Self {
        Self {
            order: default_order_phrases(),
            availability: default_availability_phrases(),
            negative_availability: default_negative_phrases(),
        }
    }
}

impl LexiconConfig {
    /// Load lexicons from a JSON file. Missing keys keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read lexicon file {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let lexicon: Self = serde_json::from_str(raw)?;
        Ok(lexicon)
    }

    /// Whether both positive lexicons are empty, which would make classification meaningless.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty() && self.availability.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_cover_original_vocabulary() {
        let lexicon = LexiconConfig::default();
        assert!(lexicon.order.iter().any(|p| p == "sipariş ver"));
        assert!(lexicon.availability.iter().any(|p| p == "in stock"));
        assert!(lexicon.negative_availability.iter().any(|p| p == "waitlist"));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let lexicon = LexiconConfig::from_json(r#"{"order": ["reserve"]}"#).unwrap();
        assert_eq!(lexicon.order, vec!["reserve".to_string()]);
        assert_eq!(lexicon.availability, default_availability_phrases());
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"order": ["kaufen"], "availability": ["lieferbar"], "negative_availability": ["ausverkauft"]}}"#
        )
        .unwrap();

        let lexicon = LexiconConfig::from_json_file(file.path()).unwrap();
        assert_eq!(lexicon.negative_availability, vec!["ausverkauft".to_string()]);
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let err = LexiconConfig::from_json_file("/nonexistent/lexicon.json").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
