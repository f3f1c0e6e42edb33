// src/matching/matcher.rs
use super::synonyms::synonyms_for;
use crate::config::Thresholds;
use crate::fields::{FieldDescriptor, FieldKind};
use crate::profile::{Profile, FILE_UPLOAD_MARKER, RESUME_KEY};
use serde::Serialize;
use strsim::normalized_levenshtein;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldMatch {
    pub profile_key: String,
    pub value: String,
    pub confidence: f64,
}

/// Result of matching a catalog against a profile
#[derive(Debug, Clone, Default)]
pub struct FieldMapping {
    pub matched: Vec<(FieldDescriptor, FieldMatch)>,
    pub unmatched: Vec<FieldDescriptor>,
}

pub struct ProfileMatcher<'a> {
    profile: &'a Profile,
    thresholds: Thresholds,
}

impl<'a> ProfileMatcher<'a> {
    pub fn new(profile: &'a Profile, thresholds: &Thresholds) -> Self {
        Self {
            profile,
            thresholds: thresholds.clone(),
        }
    }

    /// Confidence in [0, 1] that `field` holds the profile attribute `key`
    pub fn score(&self, field: &FieldDescriptor, key: &str) -> f64 {
        let identifier = field.identifier.to_lowercase();
        let name = field.name.to_lowercase();
        let id = field.id.to_lowercase();

        let mut best: f64 = 0.0;
        for synonym in synonyms_for(key) {
            let score = if !name.is_empty() && name == synonym {
                1.0
            } else if !id.is_empty() && id == synonym {
                0.95
            } else if !name.is_empty() && name.contains(&synonym) {
                0.9
            } else if !id.is_empty() && id.contains(&synonym) {
                0.85
            } else if identifier.contains(&synonym) {
                0.8
            } else {
                let similarity = normalized_levenshtein(&identifier, &synonym);
                if similarity > self.thresholds.fuzzy_similarity {
                    similarity * self.thresholds.fuzzy_weight
                } else {
                    0.0
                }
            };
            best = best.max(score);
        }

        let boost = match (field.input_type.as_deref(), key) {
            (Some("email"), "email") => 1.2,
            (Some("tel"), "phone") => 1.2,
            (Some("file"), RESUME_KEY) => 1.5,
            _ => 1.0,
        };
        (best * boost).min(1.0)
    }

    /// Best profile attribute for `field`, or `None` below the match threshold
    pub fn match_field(&self, field: &FieldDescriptor) -> Option<FieldMatch> {
        if field.kind == FieldKind::File {
            return Some(FieldMatch {
                profile_key: RESUME_KEY.to_string(),
                value: self
                    .profile
                    .get(RESUME_KEY)
                    .unwrap_or(FILE_UPLOAD_MARKER)
                    .to_string(),
                confidence: 1.0,
            });
        }

        let mut best: Option<(&str, &str, f64)> = None;
        for (key, value) in self.profile.iter() {
            let score = self.score(field, key);
            if best.map_or(true, |(_, _, top)| score > top) {
                best = Some((key, value, score));
            }
        }

        let (key, value, confidence) = best?;
        if confidence < self.thresholds.match_confidence {
            debug!(
                "No match for {:?} (best {} at {:.2})",
                field.identifier, key, confidence
            );
            return None;
        }
        debug!("Matched {:?} -> {} ({:.2})", field.identifier, key, confidence);
        Some(FieldMatch {
            profile_key: key.to_string(),
            value: value.to_string(),
            confidence,
        })
    }

    pub fn map_fields(&self, fields: Vec<FieldDescriptor>) -> FieldMapping {
        let mut mapping = FieldMapping::default();
        for field in fields {
            match self.match_field(&field) {
                Some(found) => mapping.matched.push((field, found)),
                None => mapping.unmatched.push(field),
            }
        }
        mapping
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Dom, NodeId, WalkLimits};
    use crate::fields::catalog;

    fn profile() -> Profile {
        Profile::from_pairs([
            ("first_name", "Ada"),
            ("last_name", "Lovelace"),
            ("email", "ada@example.com"),
            ("phone", "+44 20 7946 0000"),
            ("state", "CA"),
            ("linkedin", "https://linkedin.com/in/ada"),
            ("salary_expectation", "100k"),
        ])
    }

    fn field(identifier: &str, name: &str, id: &str, input_type: Option<&str>) -> FieldDescriptor {
        let kind = match input_type {
            Some("file") => FieldKind::File,
            _ => FieldKind::Text,
        };
        FieldDescriptor {
            node: dom_node(),
            identifier: identifier.to_string(),
            kind,
            name: name.to_string(),
            id: id.to_string(),
            input_type: input_type.map(str::to_string),
        }
    }

    fn dom_node() -> NodeId {
        let dom = Dom::parse("https://a.example", "<input>").unwrap();
        dom.query(dom.document(), "input").unwrap()[0]
    }

    #[test]
    fn test_exact_name_is_full_confidence() {
        let profile = profile();
        let matcher = ProfileMatcher::new(&profile, &Thresholds::default());
        let found = matcher.match_field(&field("firstName", "firstName", "", Some("text"))).unwrap();
        assert_eq!(found.profile_key, "first_name");
        assert_eq!(found.value, "Ada");
        assert_eq!(found.confidence, 1.0);
    }

    #[test]
    fn test_scoring_tiers() {
        let profile = profile();
        let matcher = ProfileMatcher::new(&profile, &Thresholds::default());
        assert_eq!(matcher.score(&field("x", "", "lastname", None), "last_name"), 0.95);
        assert_eq!(matcher.score(&field("x", "applicant_lastname", "", None), "last_name"), 0.9);
        assert_eq!(matcher.score(&field("x", "", "cand-surname-1", None), "last_name"), 0.85);
        assert_eq!(matcher.score(&field("Your Surname", "q7", "q7", None), "last_name"), 0.8);

        // fuzzy: "linkdin" vs "linkedin" is 7/8 similar
        let fuzzy = matcher.score(&field("linkdin", "", "", None), "linkedin");
        assert!((fuzzy - 0.875 * 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_type_boosts_are_capped() {
        let profile = profile();
        let matcher = ProfileMatcher::new(&profile, &Thresholds::default());
        let email = field("Contact mail", "q1", "", Some("email"));
        assert!((matcher.score(&email, "email") - 0.96).abs() < 1e-9);

        let tel = field("x", "phone", "", Some("tel"));
        assert_eq!(matcher.score(&tel, "phone"), 1.0);
    }

    #[test]
    fn test_unknown_keys_match_their_own_name() {
        let profile = profile();
        let matcher = ProfileMatcher::new(&profile, &Thresholds::default());
        let found = matcher
            .match_field(&field("Salary expectation", "comp", "", None))
            .unwrap();
        assert_eq!(found.profile_key, "salary_expectation");
        assert_eq!(found.confidence, 0.8);
    }

    #[test]
    fn test_below_threshold_is_unmatched() {
        let profile = profile();
        let matcher = ProfileMatcher::new(&profile, &Thresholds::default());
        assert!(matcher.match_field(&field("Favourite colour", "q9", "", None)).is_none());
    }

    #[test]
    fn test_file_inputs_are_resume() {
        let profile = profile();
        let matcher = ProfileMatcher::new(&profile, &Thresholds::default());
        let found = matcher.match_field(&field("Attach", "upload", "", Some("file"))).unwrap();
        assert_eq!(found.profile_key, "resume");
        assert_eq!(found.value, FILE_UPLOAD_MARKER);
        assert_eq!(found.confidence, 1.0);
    }

    #[test]
    fn test_matching_is_deterministic() {
        let dom = Dom::parse(
            "https://jobs.example",
            r#"<form><input name="firstName"><input name="email" type="email"><input name="q9" placeholder="Favourite colour"></form>"#,
        )
        .unwrap();
        let fields = catalog(&dom, dom.document(), WalkLimits::default());
        let profile = profile();
        let matcher = ProfileMatcher::new(&profile, &Thresholds::default());

        let first = matcher.map_fields(fields.clone());
        let second = matcher.map_fields(fields);
        assert_eq!(first.matched.len(), 2);
        assert_eq!(first.unmatched.len(), 1);
        let keys = |m: &FieldMapping| -> Vec<String> {
            m.matched.iter().map(|(_, f)| f.profile_key.clone()).collect()
        };
        assert_eq!(keys(&first), keys(&second));
    }
}
