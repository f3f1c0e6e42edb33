// src/profile.rs
//! The candidate profile: named attributes mapped to strings.

use crate::utils::canonical_key;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Marker value reported for file inputs, which cannot be filled
pub const FILE_UPLOAD_MARKER: &str = "[FILE_UPLOAD]";

/// Key of the résumé pseudo-attribute
pub const RESUME_KEY: &str = "resume";

/// Spellings that canonicalize differently from the attribute they mean
const KEY_ALIASES: &[(&str, &str)] = &[
    ("linked_in", "linkedin"),
    ("git_hub", "github"),
    ("e_mail", "email"),
    ("email_address", "email"),
    ("phone_number", "phone"),
    ("telephone", "phone"),
    ("zip_code", "zip"),
    ("postal_code", "zip"),
    ("postcode", "zip"),
    ("website", "portfolio"),
    ("given_name", "first_name"),
    ("family_name", "last_name"),
    ("surname", "last_name"),
    ("name", "full_name"),
    ("cv", "resume"),
];

/// Immutable candidate attributes. Keys are snake_case; empty values are
/// dropped on construction, so absent and empty are the same thing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, ProfileValue>", into = "BTreeMap<String, String>")]
pub struct Profile {
    attributes: BTreeMap<String, String>,
}

/// Raw values as they appear in profile files
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProfileValue {
    Text(String),
    Flag(bool),
    Integer(i64),
    Float(f64),
    Missing(Option<()>),
}

impl ProfileValue {
    fn into_text(self) -> Option<String> {
        match self {
            ProfileValue::Text(s) => Some(s),
            ProfileValue::Flag(b) => Some(b.to_string()),
            ProfileValue::Integer(i) => Some(i.to_string()),
            ProfileValue::Float(f) => Some(f.to_string()),
            ProfileValue::Missing(_) => None,
        }
    }
}

impl From<BTreeMap<String, ProfileValue>> for Profile {
    fn from(raw: BTreeMap<String, ProfileValue>) -> Self {
        Self::from_pairs(raw.into_iter().filter_map(|(k, v)| v.into_text().map(|v| (k, v))))
    }
}

impl From<Profile> for BTreeMap<String, String> {
    fn from(profile: Profile) -> Self {
        profile.attributes
    }
}

impl Profile {
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut attributes = BTreeMap::new();
        for (key, value) in pairs {
            let value: String = value.into();
            if value.trim().is_empty() {
                continue;
            }
            attributes.insert(normalize_key(key.as_ref()), value);
        }
        Self { attributes }
    }

    /// Load a profile from YAML, JSON or TOML, chosen by file extension
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile: {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let profile: Profile = match ext.as_str() {
            "json" => serde_json::from_str(&content).context("Failed to parse JSON profile")?,
            "toml" => toml::from_str(&content).context("Failed to parse TOML profile")?,
            "yaml" | "yml" => serde_yaml::from_str(&content).context("Failed to parse YAML profile")?,
            other => anyhow::bail!("Unsupported profile format: {:?}. Use yaml, json or toml", other),
        };
        info!("Loaded profile with {} attributes from {}", profile.len(), path.display());
        Ok(profile)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(&normalize_key(key)).map(String::as_str)
    }

    /// Attributes in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

fn normalize_key(key: &str) -> String {
    let key = canonical_key(key);
    KEY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_keys_are_canonical() {
        let profile = Profile::from_pairs([
            ("firstName", "Ada"),
            ("LinkedIn", "https://linkedin.com/in/ada"),
            ("zipCode", "94103"),
            ("city", ""),
        ]);
        assert_eq!(profile.get("first_name"), Some("Ada"));
        assert_eq!(profile.get("firstName"), Some("Ada"));
        assert_eq!(profile.get("linkedin"), Some("https://linkedin.com/in/ada"));
        assert_eq!(profile.get("zip"), Some("94103"));
        assert_eq!(profile.get("city"), None);
        assert_eq!(profile.len(), 3);
    }

    #[test]
    fn test_load_formats() {
        let dir = tempfile::tempdir().unwrap();

        let yaml = dir.path().join("profile.yaml");
        std::fs::write(&yaml, "first_name: Ada\nremote_ok: true\nyears: 7\nphone: ~\n").unwrap();
        let profile = Profile::load(&yaml).unwrap();
        assert_eq!(profile.get("first_name"), Some("Ada"));
        assert_eq!(profile.get("remote_ok"), Some("true"));
        assert_eq!(profile.get("years"), Some("7"));
        assert_eq!(profile.get("phone"), None);

        let json = dir.path().join("profile.json");
        let mut file = std::fs::File::create(&json).unwrap();
        write!(file, r#"{{"email": "ada@example.com", "github": null}}"#).unwrap();
        let profile = Profile::load(&json).unwrap();
        assert_eq!(profile.get("email"), Some("ada@example.com"));
        assert_eq!(profile.get("github"), None);

        let toml_path = dir.path().join("profile.toml");
        std::fs::write(&toml_path, "last_name = \"Lovelace\"\ncountry = \"UK\"\n").unwrap();
        let profile = Profile::load(&toml_path).unwrap();
        assert_eq!(profile.get("last_name"), Some("Lovelace"));

        let txt = dir.path().join("profile.txt");
        std::fs::write(&txt, "x").unwrap();
        assert!(Profile::load(&txt).is_err());
    }

    #[test]
    fn test_iteration_is_sorted() {
        let profile = Profile::from_pairs([("phone", "1"), ("email", "a@b.c"), ("city", "Paris")]);
        let keys: Vec<&str> = profile.keys().collect();
        assert_eq!(keys, vec!["city", "email", "phone"]);
    }
}
