// src/page_info.rs
//! Company, role and ATS extraction for the application log.

use crate::dom::{Dom, NodeId, Page, Selector};
use crate::utils::{collapse_whitespace, display_host};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

pub const UNKNOWN_POSITION: &str = "Unknown Position";
pub const UNKNOWN_ATS: &str = "Unknown";

/// ATS families recognised from the page URL
const ATS_BY_URL: &[(&str, &str)] = &[
    ("greenhouse.io", "Greenhouse"),
    ("lever.co", "Lever"),
    ("workday.com", "Workday"),
    ("myworkdayjobs.com", "Workday"),
    ("icims.com", "iCIMS"),
    ("smartrecruiters.com", "SmartRecruiters"),
    ("taleo.net", "Taleo"),
    ("ashbyhq.com", "Ashby"),
    ("bamboohr.com", "BambooHR"),
    ("jobvite.com", "Jobvite"),
    ("breezyhr.com", "Breezy"),
];

/// Vendors whose embeds leave their name in the markup
const ATS_BY_MARKUP: &[(&str, &str)] = &[
    ("greenhouse", "Greenhouse"),
    ("lever", "Lever"),
    ("workday", "Workday"),
    ("icims", "iCIMS"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    InProgress,
    Submitted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationLog {
    pub company: String,
    pub role: String,
    pub url: String,
    pub ats_type: String,
    pub status: ApplicationStatus,
    pub logged_at: DateTime<Utc>,
}

/// Receiver for application log entries; storage is up to the caller
pub trait ApplicationSink {
    fn record(&mut self, entry: ApplicationLog) -> Result<()>;
}

/// Writes entries to the log as structured events
#[derive(Debug, Default)]
pub struct TracingSink;

impl ApplicationSink for TracingSink {
    fn record(&mut self, entry: ApplicationLog) -> Result<()> {
        info!(
            company = %entry.company,
            role = %entry.role,
            ats = %entry.ats_type,
            url = %entry.url,
            "Application logged"
        );
        Ok(())
    }
}

/// Keeps entries in memory; clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<ApplicationLog>>>,
}

impl MemorySink {
    pub fn entries(&self) -> Vec<ApplicationLog> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

impl ApplicationSink for MemorySink {
    fn record(&mut self, entry: ApplicationLog) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("application log buffer poisoned"))?
            .push(entry);
        Ok(())
    }
}

pub struct PageInfo<'a> {
    page: &'a Page,
}

impl<'a> PageInfo<'a> {
    pub fn new(page: &'a Page) -> Self {
        Self { page }
    }

    pub fn application_log(&self, status: ApplicationStatus) -> ApplicationLog {
        ApplicationLog {
            company: self.company(),
            role: self.role(),
            url: self.page.url().to_string(),
            ats_type: self.ats_type(),
            status,
            logged_at: Utc::now(),
        }
    }

    pub fn company(&self) -> String {
        let selectors = [
            r#"meta[property="og:site_name"]"#,
            r#"meta[name="company"]"#,
            r#"[class*="company"]"#,
            "h1, h2",
        ];
        let dom = self.page.dom();
        for found in self.first_matches(&selectors) {
            let text = match dom.attr(found, "content") {
                Some(content) if !content.is_empty() => content.trim().to_string(),
                _ => collapse_whitespace(&dom.text_content(found)),
            };
            if !text.is_empty() && text.chars().count() < 100 {
                return text;
            }
        }
        display_host(self.page.url()).unwrap_or_default()
    }

    pub fn role(&self) -> String {
        let selectors = [
            r#"h1[class*="job"]"#,
            r#"h1[class*="title"]"#,
            r#"[class*="job-title"]"#,
            r#"[data-qa="job-title"]"#,
            "h1",
        ];
        let dom = self.page.dom();
        self.first_matches(&selectors)
            .into_iter()
            .map(|found| collapse_whitespace(&dom.text_content(found)))
            .find(|text| !text.is_empty())
            .unwrap_or_else(|| UNKNOWN_POSITION.to_string())
    }

    pub fn ats_type(&self) -> String {
        let url = self.page.url().to_lowercase();
        if let Some((_, ats)) = ATS_BY_URL.iter().find(|(pattern, _)| url.contains(pattern)) {
            return ats.to_string();
        }
        let html = self.page.to_html().to_lowercase();
        ATS_BY_MARKUP
            .iter()
            .find(|(marker, _)| html.contains(marker))
            .map(|(_, ats)| ats.to_string())
            .unwrap_or_else(|| UNKNOWN_ATS.to_string())
    }

    /// First element for each selector that matches anything, in selector order
    fn first_matches(&self, selectors: &[&str]) -> Vec<NodeId> {
        let dom: &Dom = self.page.dom();
        selectors
            .iter()
            .filter_map(|s| match Selector::parse(s) {
                Ok(selector) => dom.select_first(dom.document(), &selector),
                Err(e) => {
                    warn!("Skipping selector {:?}: {}", s, e);
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(url: &str, html: &str) -> Page {
        Page::from_html(url, html).unwrap()
    }

    #[test]
    fn test_company_sources() {
        let page = load(
            "https://boards.greenhouse.io/acme/jobs/1",
            r#"<head><meta property="og:site_name" content="Acme Corp"></head><body><h1>Engineer</h1></body>"#,
        );
        assert_eq!(PageInfo::new(&page).company(), "Acme Corp");

        let page = load(
            "https://acme.example/jobs",
            r#"<div class="company-name">  Acme
                Robotics </div><h1>Engineer</h1>"#,
        );
        assert_eq!(PageInfo::new(&page).company(), "Acme Robotics");

        let page = load("https://www.acme.example/jobs", "<p>no headings</p>");
        assert_eq!(PageInfo::new(&page).company(), "acme.example");
    }

    #[test]
    fn test_role_sources() {
        let page = load(
            "https://jobs.lever.co/acme/1",
            r#"<h1>Acme</h1><h1 class="posting-title">Staff Engineer</h1>"#,
        );
        assert_eq!(PageInfo::new(&page).role(), "Staff Engineer");

        let page = load("https://acme.example", r#"<div data-qa="job-title">Designer</div>"#);
        assert_eq!(PageInfo::new(&page).role(), "Designer");

        let page = load("https://acme.example", "<p>nothing</p>");
        assert_eq!(PageInfo::new(&page).role(), UNKNOWN_POSITION);
    }

    #[test]
    fn test_ats_type() {
        let ats = |url: &str, html: &str| PageInfo::new(&load(url, html)).ats_type();
        assert_eq!(ats("https://acme.wd1.myworkdayjobs.com/x", ""), "Workday");
        assert_eq!(ats("https://jobs.ashbyhq.com/acme", ""), "Ashby");
        assert_eq!(
            ats("https://acme.example/careers", r#"<script src="https://boards.greenhouse.io/embed/job_board/js"></script>"#),
            "Greenhouse"
        );
        assert_eq!(ats("https://acme.example/careers", "<p>Join us</p>"), UNKNOWN_ATS);
    }

    #[test]
    fn test_application_log_to_sink() {
        let page = load(
            "https://jobs.lever.co/acme/1",
            r#"<meta name="company" content="Acme"><h1 class="job-title">SRE</h1>"#,
        );
        let mut sink = MemorySink::default();
        let entry = PageInfo::new(&page).application_log(ApplicationStatus::InProgress);
        sink.record(entry).unwrap();

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].company, "Acme");
        assert_eq!(entries[0].role, "SRE");
        assert_eq!(entries[0].ats_type, "Lever");
        let json = serde_json::to_value(&entries[0]).unwrap();
        assert_eq!(json["status"], "in_progress");
    }
}
