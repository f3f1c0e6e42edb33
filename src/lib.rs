// src/lib.rs
//! Detects job-application forms on ATS pages and fills them from a
//! candidate profile.

use anyhow::Result;
use tracing::info;

pub mod adapters;
pub mod cli;
pub mod config;
pub mod detection;
pub mod dom;
pub mod fields;
pub mod fill;
pub mod matching;
pub mod page_info;
pub mod profile;
pub mod session;
pub mod utils;

pub use adapters::{Adapter, AdapterTable};
pub use config::EngineConfig;
pub use detection::{DetectedForm, FormLocator, WizardDetector, WizardState};
pub use dom::{Dom, Page};
pub use fill::{FillExecutor, FillOptions, FillResult};
pub use matching::ProfileMatcher;
pub use page_info::{ApplicationLog, ApplicationSink, PageInfo};
pub use profile::Profile;
pub use session::Session;

/// Settle, detect and fill one page in a fresh session
pub async fn autofill_page(
    page: &mut Page,
    profile: &Profile,
    config: EngineConfig,
    options: FillOptions,
) -> Result<FillResult> {
    config.validate()?;
    let mut session = Session::new(config, page.url());
    if session.start(page).await.is_none() {
        info!("No application form detected on {}", page.url());
    }
    Ok(session.fill(page, profile, options).await)
}
