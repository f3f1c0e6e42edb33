// src/adapters.rs
//! Declarative per-ATS adapter table: site patterns, settle delays and
//! optional selector hints layered over the generic engine.

use crate::config::EngineConfig;
use crate::dom::Selector;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub const GENERIC: &str = "generic";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adapter {
    pub name: String,
    /// Substrings matched against the page URL host
    #[serde(default)]
    pub site_patterns: Vec<String>,
    /// Wait before the first detection, for client-rendered forms
    pub settle_delay_ms: u64,
    /// Wait after pressing Next before re-detecting
    #[serde(default = "default_next_settle")]
    pub next_settle_ms: u64,
    #[serde(default)]
    pub form_hint: Option<String>,
    #[serde(default)]
    pub next_hint: Option<String>,
}

fn default_next_settle() -> u64 {
    1500
}

impl Adapter {
    fn new(name: &str, patterns: &[&str], settle_delay_ms: u64, next_settle_ms: u64) -> Self {
        Self {
            name: name.to_string(),
            site_patterns: patterns.iter().map(|p| p.to_string()).collect(),
            settle_delay_ms,
            next_settle_ms,
            form_hint: None,
            next_hint: None,
        }
    }

    fn with_form_hint(mut self, selector: &str) -> Self {
        self.form_hint = Some(selector.to_string());
        self
    }

    fn with_next_hint(mut self, selector: &str) -> Self {
        self.next_hint = Some(selector.to_string());
        self
    }

    pub fn generic() -> Self {
        Self::new(GENERIC, &[], 1000, 1500)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn next_settle(&self) -> Duration {
        Duration::from_millis(self.next_settle_ms)
    }

    pub fn form_selector(&self) -> Option<Selector> {
        self.form_hint.as_deref().and_then(|s| parse_hint(&self.name, s))
    }

    pub fn next_selector(&self) -> Option<Selector> {
        self.next_hint.as_deref().and_then(|s| parse_hint(&self.name, s))
    }

    pub fn matches_host(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.site_patterns
            .iter()
            .any(|p| !p.is_empty() && host.contains(&p.to_ascii_lowercase()))
    }
}

/// Hints are data; a broken one is ignored rather than failing detection
fn parse_hint(adapter: &str, selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(selector) => Some(selector),
        Err(e) => {
            warn!("Ignoring invalid {} selector hint {:?}: {}", adapter, selector, e);
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdapterTable {
    adapters: Vec<Adapter>,
}

impl AdapterTable {
    pub fn builtin() -> Self {
        let adapters = vec![
            Adapter::new("workday", &["myworkdayjobs.com", "workday.com"], 2000, 2000)
                .with_form_hint(r#"[data-automation-id="jobApplication"], form[id*="wd-application"]"#)
                .with_next_hint(r#"[data-automation-id="bottom-navigation-next-button"]"#),
            Adapter::new("greenhouse", &["greenhouse.io"], 1000, 1500)
                .with_form_hint("form#application_form, form.application-form"),
            Adapter::new("lever", &["lever.co"], 1000, 1500)
                .with_form_hint(r#"form.application-form, [data-qa="application-form"]"#),
            Adapter::new("icims", &["icims.com"], 500, 1500)
                .with_form_hint(r#"form.iCIMS_JobApply, form[id*="icims"]"#),
            Adapter::new("smartrecruiters", &["smartrecruiters.com"], 1500, 1500),
            Adapter::new("ashby", &["ashbyhq.com"], 1500, 1500),
            Adapter::generic(),
        ];
        Self { adapters }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        match &config.adapters {
            Some(adapters) => Self {
                adapters: adapters.clone(),
            },
            None => Self::builtin(),
        }
    }

    pub fn adapters(&self) -> &[Adapter] {
        &self.adapters
    }

    /// Adapter for a page URL; the generic entry (or a default one) otherwise
    pub fn resolve(&self, url: &str) -> Adapter {
        let host = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();

        let found = self
            .adapters
            .iter()
            .find(|a| a.matches_host(&host))
            .or_else(|| self.adapters.iter().find(|a| a.name == GENERIC))
            .cloned()
            .unwrap_or_else(Adapter::generic);
        debug!("Adapter for {}: {}", url, found.name);
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_by_host() {
        let table = AdapterTable::builtin();
        assert_eq!(table.resolve("https://acme.wd5.myworkdayjobs.com/en-US/job/1").name, "workday");
        assert_eq!(table.resolve("https://boards.greenhouse.io/acme/jobs/42").name, "greenhouse");
        assert_eq!(table.resolve("https://jobs.lever.co/acme/abc/apply").name, "lever");
        assert_eq!(table.resolve("https://careers-acme.icims.com/jobs/1").name, "icims");
        assert_eq!(table.resolve("https://jobs.ashbyhq.com/acme").name, "ashby");
        assert_eq!(table.resolve("https://acme.com/careers").name, GENERIC);
        assert_eq!(table.resolve("not a url").name, GENERIC);
    }

    #[test]
    fn test_path_does_not_select_adapter() {
        let table = AdapterTable::builtin();
        assert_eq!(table.resolve("https://acme.com/lever.co/apply").name, GENERIC);
    }

    #[test]
    fn test_builtin_hints_parse() {
        for adapter in AdapterTable::builtin().adapters() {
            if adapter.form_hint.is_some() {
                assert!(adapter.form_selector().is_some(), "{}", adapter.name);
            }
            if adapter.next_hint.is_some() {
                assert!(adapter.next_selector().is_some(), "{}", adapter.name);
            }
        }
    }

    #[test]
    fn test_table_from_config() {
        let yaml = r##"
adapters:
  - name: acme
    site_patterns: ["acme-jobs.example"]
    settle_delay_ms: 250
    form_hint: "#apply"
"##;
        let config: EngineConfig = serde_yaml::from_str(yaml).unwrap();
        let table = AdapterTable::from_config(&config);
        let adapter = table.resolve("https://www.acme-jobs.example/role/7");
        assert_eq!(adapter.name, "acme");
        assert_eq!(adapter.settle_delay(), Duration::from_millis(250));
        assert_eq!(adapter.next_settle_ms, 1500);

        // no generic entry configured: a default one is synthesized
        assert_eq!(table.resolve("https://other.example").name, GENERIC);
    }
}
