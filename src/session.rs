// src/session.rs
//! Per-page session: tracks the detected form and wizard state, re-detects
//! after DOM mutations and drives fill / fill-and-continue.

use crate::adapters::{Adapter, AdapterTable};
use crate::config::{EngineConfig, Timing};
use crate::detection::{DetectedForm, FormLocator, WizardDetector, WizardState};
use crate::dom::{NodeId, Page};
use crate::fill::{FillExecutor, FillOptions, FillResult};
use crate::page_info::{ApplicationSink, ApplicationStatus, PageInfo};
use crate::profile::Profile;
use anyhow::Result;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

/// Debounces mutation bursts and rate-limits the re-detections they trigger
#[derive(Debug, Clone)]
pub struct MutationWatcher {
    debounce: Duration,
    min_interval: Duration,
    last_mutation: Option<Instant>,
    last_detection: Option<Instant>,
}

impl MutationWatcher {
    pub fn new(timing: &Timing) -> Self {
        Self {
            debounce: timing.mutation_debounce(),
            min_interval: timing.min_redetect_interval(),
            last_mutation: None,
            last_detection: None,
        }
    }

    /// Note `count` mutations observed at `now`
    pub fn record(&mut self, count: u64, now: Instant) {
        if count > 0 {
            self.last_mutation = Some(now);
        }
    }

    pub fn is_pending(&self) -> bool {
        self.last_mutation.is_some()
    }

    /// Mutations are pending, quiet for the debounce period, and the last
    /// detection is at least the minimum interval ago
    pub fn is_due(&self, now: Instant) -> bool {
        let Some(last_mutation) = self.last_mutation else {
            return false;
        };
        let quiet = now.saturating_duration_since(last_mutation) >= self.debounce;
        let spaced = self
            .last_detection
            .map_or(true, |t| now.saturating_duration_since(t) >= self.min_interval);
        quiet && spaced
    }

    /// Earliest moment the pending mutations may trigger a detection
    pub fn next_due(&self) -> Option<Instant> {
        let last_mutation = self.last_mutation?;
        let quiet = last_mutation + self.debounce;
        Some(match self.last_detection {
            Some(t) => quiet.max(t + self.min_interval),
            None => quiet,
        })
    }

    pub fn detection_ran(&mut self, now: Instant) {
        self.last_detection = Some(now);
        self.last_mutation = None;
    }
}

/// What a mutation callback did
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// Nothing pending, or still inside the debounce / rate-limit window
    Idle,
    /// The tracked form was missing or detached and detection ran again
    Redetected(Option<DetectedForm>),
    /// Same form, new wizard step
    StepChanged(WizardState),
    Unchanged,
}

/// Result of filling one wizard step and moving on
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub result: FillResult,
    /// The Next control that was clicked
    pub advanced_with: Option<NodeId>,
    /// Form detected on the following step
    pub next_form: Option<DetectedForm>,
}

pub struct Session {
    id: Uuid,
    span: Span,
    config: EngineConfig,
    adapter: Adapter,
    form: Option<DetectedForm>,
    wizard: WizardState,
    watcher: MutationWatcher,
}

impl Session {
    pub fn new(config: EngineConfig, url: &str) -> Self {
        let adapter = AdapterTable::from_config(&config).resolve(url);
        Self::with_adapter(config, adapter)
    }

    pub fn with_adapter(config: EngineConfig, adapter: Adapter) -> Self {
        let id = Uuid::new_v4();
        let span = info_span!("session", id = %id, adapter = %adapter.name);
        let watcher = MutationWatcher::new(&config.timing);
        Self {
            id,
            span,
            config,
            adapter,
            form: None,
            wizard: WizardState::default(),
            watcher,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn form(&self) -> Option<DetectedForm> {
        self.form
    }

    pub fn wizard(&self) -> &WizardState {
        &self.wizard
    }

    /// When `observe` will next act on pending mutations, if any are pending
    pub fn next_due(&self) -> Option<Instant> {
        self.watcher.next_due()
    }

    /// Wait for the adapter's settle delay, then run the first detection
    pub async fn start(&mut self, page: &mut Page) -> Option<DetectedForm> {
        let span = self.span.clone();
        async {
            info!(
                "Session started on {}, settling {}ms",
                page.url(),
                self.adapter.settle_delay_ms
            );
            tokio::time::sleep(self.adapter.settle_delay()).await;
            self.detect(page)
        }
        .instrument(span)
        .await
    }

    /// Run form and wizard detection, replacing whatever was tracked
    pub fn detect(&mut self, page: &mut Page) -> Option<DetectedForm> {
        self.detect_at(page, Instant::now())
    }

    /// `detect`, stamped with the caller's clock. Mutations made so far are
    /// reflected in the result and no longer count as pending.
    pub fn detect_at(&mut self, page: &mut Page, now: Instant) -> Option<DetectedForm> {
        let _span = self.span.clone().entered();
        page.take_mutations();
        let dom = page.dom();
        self.form = FormLocator::new(&self.config)
            .with_adapter(&self.adapter)
            .detect(dom);
        self.wizard = match self.form {
            Some(_) => WizardDetector::new(&self.config)
                .with_adapter(&self.adapter)
                .detect(dom),
            None => WizardState::default(),
        };
        if self.wizard.is_wizard {
            info!(
                "Multi-step form: step {:?} of {:?}",
                self.wizard.current_step, self.wizard.total_steps
            );
        }
        self.watcher.detection_ran(now);
        self.form
    }

    /// Mutation callback. Collects pending mutations and, once they have
    /// settled, re-detects a vanished form or refreshes the wizard step.
    /// Nothing happens between calls; use `watch` to wait for `next_due`.
    pub fn observe(&mut self, page: &mut Page, now: Instant) -> Observation {
        let _span = self.span.clone().entered();
        let count = page.take_mutations();
        self.watcher.record(count, now);
        if !self.watcher.is_due(now) {
            return Observation::Idle;
        }

        let dom = page.dom();
        let tracked = self.form.filter(|f| dom.is_connected(f.container));
        if tracked.is_none() {
            info!("Tracked form missing or detached, re-detecting");
            return Observation::Redetected(self.detect_at(page, now));
        }

        let wizard = WizardDetector::new(&self.config)
            .with_adapter(&self.adapter)
            .detect(dom);
        self.watcher.detection_ran(now);
        if wizard.step() != self.wizard.step() {
            info!("Wizard step changed to {:?}", wizard.current_step);
            self.wizard = wizard.clone();
            return Observation::StepChanged(wizard);
        }
        debug!("Mutations settled, form unchanged");
        Observation::Unchanged
    }

    /// Sleep until pending mutations are due and handle them. Returns `Idle`
    /// straight away when nothing is pending.
    pub async fn watch(&mut self, page: &mut Page) -> Observation {
        let span = self.span.clone();
        async {
            loop {
                let observation = self.observe(page, Instant::now());
                if observation != Observation::Idle {
                    return observation;
                }
                match self.watcher.next_due() {
                    Some(due) => {
                        debug!("Waiting for mutations to settle");
                        tokio::time::sleep_until(due).await;
                    }
                    None => return Observation::Idle,
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Fill the tracked form, detecting first if nothing is tracked. No form
    /// yields an empty result.
    pub async fn fill(&mut self, page: &mut Page, profile: &Profile, options: FillOptions) -> FillResult {
        let span = self.span.clone();
        async {
            let tracked = self.form.filter(|f| page.dom().is_connected(f.container));
            let form = match tracked {
                Some(form) => Some(form),
                None => self.detect(page),
            };
            let Some(form) = form else {
                warn!("No application form on {}, nothing to fill", page.url());
                let mut empty = FillResult::new();
                empty.finish();
                return empty;
            };

            let mut executor = FillExecutor::new(&self.config, options);
            let result = executor.fill(page, form.container, profile).await;
            if let Err(e) = executor.highlight_file_uploads(page, &result.file_uploads).await {
                warn!("Could not highlight upload fields: {}", e);
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Fill the current step, press Next and re-detect on the next step
    pub async fn fill_and_continue(
        &mut self,
        page: &mut Page,
        profile: &Profile,
        options: FillOptions,
    ) -> StepOutcome {
        let result = self.fill(page, profile, options).await;

        let span = self.span.clone();
        async {
            tokio::time::sleep(self.config.timing.fill_settle()).await;

            let dom = page.dom();
            let next = self
                .wizard
                .next_control
                .filter(|n| dom.is_connected(*n) && !dom.is_disabled(*n))
                .or_else(|| {
                    WizardDetector::new(&self.config)
                        .with_adapter(&self.adapter)
                        .find_next_control(dom)
                });

            let Some(next) = next else {
                warn!("Could not find a Next control, it has to be clicked manually");
                return StepOutcome {
                    result,
                    advanced_with: None,
                    next_form: self.form,
                };
            };

            info!("Clicking Next control {}", next);
            page.click(next);
            tokio::time::sleep(self.adapter.next_settle()).await;
            let next_form = self.detect(page);
            StepOutcome {
                result,
                advanced_with: Some(next),
                next_form,
            }
        }
        .instrument(span)
        .await
    }

    /// Send an in-progress application entry for this page to `sink`
    pub fn log_application(&self, page: &Page, sink: &mut dyn ApplicationSink) -> Result<()> {
        let _span = self.span.clone().entered();
        let entry = PageInfo::new(page).application_log(ApplicationStatus::InProgress);
        info!("Logging application: {} at {}", entry.role, entry.company);
        sink.record(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Dom, DomEvent, EventKind, PageScript};
    use crate::page_info::MemorySink;
    use std::cell::RefCell;
    use std::rc::Rc;

    const GREENHOUSE_URL: &str = "https://boards.greenhouse.io/acme/jobs/42";

    fn instant() -> FillOptions {
        FillOptions::default()
            .with_human_like(false)
            .with_scrolling(false)
            .with_focus(false)
            .with_pacing_seed(3)
    }

    fn by_name(page: &Page, name: &str) -> NodeId {
        page.dom()
            .query(page.dom().document(), &format!("[name={}]", name))
            .unwrap()[0]
    }

    fn ada() -> Profile {
        Profile::from_pairs([
            ("first_name", "Ada"),
            ("last_name", "Lovelace"),
            ("email", "ada@example.com"),
            ("phone", "555-0100"),
            ("state", "ca"),
            ("gender", "female"),
        ])
    }

    const APPLICATION: &str = r#"<h1 class="app-title">Backend Engineer</h1>
        <form id="application_form" action="/acme/jobs/42/apply">
            <input name="firstName">
            <input name="last_name">
            <input type="email" name="email">
            <input type="tel" name="phone">
            <label for="st">State</label>
            <select id="st" name="state"><option>California</option><option>New York</option></select>
            <label for="g">Gender</label><select id="g" name="q_1"><option>Female</option><option>Male</option></select>
            <input type="file" name="resume" accept="application/pdf">
            <button type="submit">Submit Application</button>
        </form>"#;

    #[tokio::test(start_paused = true)]
    async fn test_start_waits_for_adapter_settle() {
        let mut page = Page::from_html(GREENHOUSE_URL, APPLICATION).unwrap();
        let mut session = Session::new(EngineConfig::default(), GREENHOUSE_URL);
        assert_eq!(session.adapter().name, "greenhouse");

        let before = Instant::now();
        let form = session.start(&mut page).await.unwrap();
        assert_eq!(before.elapsed(), Duration::from_millis(1000));
        assert!(form.hinted);
        assert_eq!(page.dom().attr(form.container, "id"), Some("application_form"));
        assert!(!session.wizard().is_wizard);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fill_scenarios() {
        let mut page = Page::from_html(GREENHOUSE_URL, APPLICATION).unwrap();
        let mut session = Session::new(EngineConfig::default(), GREENHOUSE_URL);
        let result = session.fill(&mut page, &ada(), instant()).await;

        let first = result
            .filled
            .iter()
            .find(|f| f.field.name == "firstName")
            .unwrap();
        assert!(first.confidence >= 0.85);
        assert_eq!(page.dom().value(by_name(&page, "firstName")), "Ada");
        assert_eq!(page.dom().value(by_name(&page, "state")), "California");

        let gender = by_name(&page, "q_1");
        assert_eq!(result.bucket_of(gender), None);
        assert_eq!(page.dom().value(gender), "Female");

        assert_eq!(result.file_uploads.len(), 1);
        assert!(page
            .dom()
            .attr(by_name(&page, "resume"), "style")
            .unwrap_or_default()
            .contains("border"));
        assert_eq!(result.total_fields, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fill_is_idempotent() {
        let mut page = Page::from_html(GREENHOUSE_URL, APPLICATION).unwrap();
        let mut session = Session::new(EngineConfig::default(), GREENHOUSE_URL);
        let first = session.fill(&mut page, &ada(), instant()).await;
        let second = session.fill(&mut page, &ada(), instant()).await;

        let buckets = |r: &FillResult| -> Vec<Option<&'static str>> {
            ["firstName", "last_name", "email", "phone", "state", "q_1", "resume"]
                .iter()
                .map(|n| r.bucket_of(by_name(&page, n)))
                .collect()
        };
        assert_eq!(buckets(&first), buckets(&second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fill_without_form_is_empty() {
        let mut page = Page::from_html("https://acme.example/about", "<p>About us</p>").unwrap();
        let mut session = Session::new(EngineConfig::default(), page.url());
        let result = session.fill(&mut page, &ada(), instant()).await;
        assert!(result.is_empty());
        assert_eq!(result.total_fields, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_implicit_form_round_trip() {
        let inputs: String = (0..11)
            .map(|i| format!(r#"<input name="extra_{}">"#, i))
            .collect();
        let html = format!(
            r#"<div class="application-wrapper"><input name="city">{}</div>"#,
            inputs
        );
        let url = "https://acme.example/careers/apply";
        let mut page = Page::from_html(url, &html).unwrap();
        let mut session = Session::new(EngineConfig::default(), url);
        let form = session.detect(&mut page).unwrap();
        assert!(form.implicit);

        let profile = Profile::from_pairs([("city", "Paris")]);
        session.fill(&mut page, &profile, instant()).await;
        assert_eq!(page.dom().value(by_name(&page, "city")), "Paris");
    }

    /// Replaces the form with step two when Next is clicked
    struct TwoStepWizard {
        clicks: Rc<RefCell<u32>>,
    }

    impl PageScript for TwoStepWizard {
        fn on_event(&mut self, dom: &mut Dom, event: &DomEvent) {
            if event.kind != EventKind::Click || dom.attr(event.target, "id") != Some("next") {
                return;
            }
            *self.clicks.borrow_mut() += 1;
            if let Some(body) = dom.body() {
                let _ = dom.set_inner_html(
                    body,
                    r#"<div class="progress">Step 2 of 2</div>
                    <form id="step2" class="application">
                        <input name="city"><input name="country"><input type="email" name="email">
                        <button type="submit">Submit application</button>
                    </form>"#,
                );
            }
        }
    }

    const STEP_ONE: &str = r#"<div class="progress">Step 1 of 2</div>
        <form id="step1" class="application">
            <input name="first_name"><input name="last_name"><input type="email" name="email">
            <button type="button" id="next">Next →</button>
        </form>"#;

    #[tokio::test(start_paused = true)]
    async fn test_fill_and_continue_walks_wizard() {
        let url = "https://acme.example/apply";
        let mut page = Page::from_html(url, STEP_ONE).unwrap();
        let clicks = Rc::new(RefCell::new(0));
        page.add_script(TwoStepWizard {
            clicks: clicks.clone(),
        });

        let mut session = Session::new(EngineConfig::default(), url);
        session.detect(&mut page).unwrap();
        assert_eq!(session.wizard().current_step, Some(1));
        assert_eq!(session.wizard().total_steps, Some(2));

        let profile = Profile::from_pairs([
            ("first_name", "Ada"),
            ("email", "ada@example.com"),
            ("city", "London"),
        ]);
        let before = Instant::now();
        let outcome = session.fill_and_continue(&mut page, &profile, instant()).await;
        // fill settle 1000ms + generic next-step settle 1500ms
        assert_eq!(before.elapsed(), Duration::from_millis(2500));

        assert_eq!(*clicks.borrow(), 1);
        assert!(outcome.advanced_with.is_some());
        assert_eq!(outcome.result.filled.len(), 2);
        let next_form = outcome.next_form.unwrap();
        assert_eq!(page.dom().attr(next_form.container, "id"), Some("step2"));
        assert_eq!(session.wizard().current_step, Some(2));

        let result = session.fill(&mut page, &profile, instant()).await;
        assert_eq!(page.dom().value(by_name(&page, "city")), "London");
        assert_eq!(result.skipped.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_observe_debounces_and_rate_limits() {
        let url = "https://acme.example/apply";
        let mut page = Page::from_html(url, STEP_ONE).unwrap();
        let mut session = Session::new(EngineConfig::default(), url);
        session.detect(&mut page).unwrap();
        let t0 = Instant::now();

        // form removed by the page
        let form = page.dom().element_by_id(page.dom().document(), "step1").unwrap();
        page.dom_mut().remove(form).unwrap();
        assert_eq!(session.observe(&mut page, t0), Observation::Idle);
        // quiet for the debounce period but too close to the previous detection
        assert_eq!(
            session.observe(&mut page, t0 + Duration::from_millis(600)),
            Observation::Idle
        );
        // the page keeps mutating
        let body = page.dom().body().unwrap();
        page.dom_mut()
            .append_html(body, r#"<form id="again" class="job-application"><input name="email"><input name="full_name"></form>"#)
            .unwrap();
        assert_eq!(
            session.observe(&mut page, t0 + Duration::from_millis(900)),
            Observation::Idle
        );

        match session.observe(&mut page, t0 + Duration::from_millis(1400)) {
            Observation::Redetected(Some(found)) => {
                assert_eq!(page.dom().attr(found.container, "id"), Some("again"));
            }
            other => panic!("expected re-detection, got {:?}", other),
        }
        assert_eq!(
            session.observe(&mut page, t0 + Duration::from_millis(5000)),
            Observation::Idle
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_observe_tracks_step_changes() {
        let url = "https://acme.example/apply";
        let mut page = Page::from_html(url, STEP_ONE).unwrap();
        let mut session = Session::new(EngineConfig::default(), url);
        session.detect(&mut page).unwrap();
        let t0 = Instant::now();

        let progress = page.dom().query(page.dom().document(), ".progress").unwrap()[0];
        page.dom_mut().set_text_content(progress, "Step 2 of 2").unwrap();
        session.observe(&mut page, t0);
        match session.observe(&mut page, t0 + Duration::from_millis(1000)) {
            Observation::StepChanged(state) => assert_eq!(state.current_step, Some(2)),
            other => panic!("expected step change, got {:?}", other),
        }

        page.dom_mut().set_attr(progress, "data-x", "1").unwrap();
        session.observe(&mut page, t0 + Duration::from_millis(1100));
        assert_eq!(
            session.observe(&mut page, t0 + Duration::from_millis(2100)),
            Observation::Unchanged
        );
    }

    const SINGLE: &str = r#"<form id="f" class="job-application"><input name="email"><input name="full_name"></form>"#;

    #[tokio::test(start_paused = true)]
    async fn test_watch_redetects_replaced_form() {
        let url = "https://acme.example/apply";
        let mut page = Page::from_html(url, SINGLE).unwrap();
        let mut session = Session::new(EngineConfig::default(), url);
        session.detect(&mut page).unwrap();
        let t0 = Instant::now();

        let old = page.dom().element_by_id(page.dom().document(), "f").unwrap();
        page.dom_mut().remove(old).unwrap();
        let body = page.dom().body().unwrap();
        page.dom_mut()
            .append_html(body, &SINGLE.replace("id=\"f\"", "id=\"g\""))
            .unwrap();

        assert_eq!(session.observe(&mut page, t0), Observation::Idle);
        assert_eq!(session.next_due(), Some(t0 + Duration::from_millis(1000)));

        match session.watch(&mut page).await {
            Observation::Redetected(Some(found)) => {
                assert_eq!(page.dom().attr(found.container, "id"), Some("g"));
            }
            other => panic!("expected re-detection, got {:?}", other),
        }
        assert_eq!(t0.elapsed(), Duration::from_millis(1000));
        let tracked = session.form().unwrap();
        assert!(page.dom().is_connected(tracked.container));
        assert_eq!(session.next_due(), None);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(session.watch(&mut page).await, Observation::Idle);
        assert_eq!(session.form(), Some(tracked));
    }

    #[tokio::test(start_paused = true)]
    async fn test_detect_uses_caller_clock() {
        let url = "https://acme.example/apply";
        let mut page = Page::from_html(url, STEP_ONE).unwrap();
        let mut session = Session::new(EngineConfig::default(), url);
        let body = page.dom().body().unwrap();
        page.dom_mut().set_attr(body, "class", "loaded").unwrap();

        let later = Instant::now() + Duration::from_secs(10);
        session.detect_at(&mut page, later).unwrap();
        // the earlier mutation is already reflected in the detection
        assert_eq!(session.observe(&mut page, later), Observation::Idle);
        assert_eq!(session.next_due(), None);

        page.dom_mut().set_attr(body, "data-step", "1").unwrap();
        assert_eq!(session.observe(&mut page, later), Observation::Idle);
        assert_eq!(session.next_due(), Some(later + Duration::from_millis(1000)));
        assert_eq!(
            session.observe(&mut page, later + Duration::from_millis(600)),
            Observation::Idle
        );
        assert_eq!(
            session.observe(&mut page, later + Duration::from_millis(1000)),
            Observation::Unchanged
        );
    }

    #[test]
    fn test_log_application() {
        let page = Page::from_html(GREENHOUSE_URL, APPLICATION).unwrap();
        let session = Session::new(EngineConfig::default(), GREENHOUSE_URL);
        let mut sink = MemorySink::default();
        session.log_application(&page, &mut sink).unwrap();

        let entries = sink.entries();
        assert_eq!(entries[0].role, "Backend Engineer");
        assert_eq!(entries[0].ats_type, "Greenhouse");
        assert_eq!(entries[0].status, ApplicationStatus::InProgress);
    }
}
