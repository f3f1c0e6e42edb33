// src/detection/wizard.rs
//! Multi-step ("wizard") form detection: step counters and the control that
//! advances to the next step.

use crate::adapters::Adapter;
use crate::config::EngineConfig;
use crate::dom::{ComposedWalk, Dom, NodeId};
use crate::utils::{contains_any, normalize_caption};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use tracing::debug;

const WIZARD_WORDS: &[&str] = &["step", "wizard", "progress", "stage"];

const NEXT_CAPTIONS: &[&str] = &["next", "continue", "proceed", "save and continue"];

static STEP_COUNTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\s*(?:of|/)\s*\d+").expect("valid regex"));
static CURRENT_STEP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:step|page)\s*(\d+)").expect("valid regex"));
static CURRENT_FRACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*/\s*\d+").expect("valid regex"));
static TOTAL_STEPS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:of|/)\s*(\d+)").expect("valid regex"));

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WizardState {
    pub is_wizard: bool,
    pub current_step: Option<u32>,
    pub total_steps: Option<u32>,
    pub next_control: Option<NodeId>,
    /// Progress bar or stepper element, when the page has one
    pub progress_element: Option<NodeId>,
}

impl WizardState {
    /// Position in the wizard, for noticing step transitions
    pub fn step(&self) -> Option<(u32, Option<u32>)> {
        self.current_step.map(|current| (current, self.total_steps))
    }
}

pub struct WizardDetector<'a> {
    config: &'a EngineConfig,
    adapter: Option<&'a Adapter>,
}

impl<'a> WizardDetector<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            config,
            adapter: None,
        }
    }

    pub fn with_adapter(mut self, adapter: &'a Adapter) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn detect(&self, dom: &Dom) -> WizardState {
        let Some(body) = dom.body() else {
            return WizardState::default();
        };
        let text = dom.text_content(body).to_lowercase();
        if !contains_any(&text, WIZARD_WORDS) && !STEP_COUNTER.is_match(&text) {
            return WizardState::default();
        }

        let current_step = CURRENT_STEP
            .captures(&text)
            .or_else(|| CURRENT_FRACTION.captures(&text))
            .and_then(|c| c[1].parse().ok())
            .unwrap_or(1);
        let total_steps = TOTAL_STEPS
            .captures(&text)
            .and_then(|c| c[1].parse().ok());

        let state = WizardState {
            is_wizard: true,
            current_step: Some(current_step),
            total_steps,
            next_control: self.find_next_control(dom),
            progress_element: find_progress_element(dom),
        };
        debug!(
            "Wizard detected: step {:?} of {:?}, next control {:?}",
            state.current_step, state.total_steps, state.next_control
        );
        state
    }

    /// The control that advances the wizard: the adapter hint, else the first
    /// enabled control whose caption reads like "Next"
    pub fn find_next_control(&self, dom: &Dom) -> Option<NodeId> {
        let limits = self.config.walk_limits(true);
        let elements: Vec<NodeId> = ComposedWalk::new(dom, dom.document(), limits)
            .map(|(node, _)| node)
            .filter(|node| !dom.is_disabled(*node))
            .collect();

        if let Some(selector) = self.adapter.and_then(|a| a.next_selector()) {
            if let Some(hinted) = elements.iter().copied().find(|n| selector.matches(dom, *n)) {
                return Some(hinted);
            }
        }

        let tiers: [fn(&Dom, NodeId) -> bool; 4] = [
            |dom, n| dom.is_tag(n, "button") && button_type(dom, n) != "submit",
            |dom, n| dom.input_type(n).as_deref() == Some("button"),
            |dom, n| {
                dom.is_tag(n, "a") || (!dom.is_tag(n, "button") && dom.attr(n, "role") == Some("button"))
            },
            |dom, n| {
                (dom.is_tag(n, "button") && button_type(dom, n) == "submit")
                    || dom.input_type(n).as_deref() == Some("submit")
            },
        ];

        tiers.iter().find_map(|in_tier| {
            elements
                .iter()
                .copied()
                .filter(|n| in_tier(dom, *n))
                .find(|n| NEXT_CAPTIONS.contains(&normalize_caption(&caption(dom, *n)).as_str()))
        })
    }
}

fn button_type(dom: &Dom, button: NodeId) -> String {
    dom.attr_or_empty(button, "type").trim().to_ascii_lowercase()
}

fn caption(dom: &Dom, control: NodeId) -> String {
    if dom.is_tag(control, "input") {
        return dom.attr_or_empty(control, "value").to_string();
    }
    let text = dom.text_content(control);
    if text.trim().is_empty() {
        dom.attr_or_empty(control, "value").to_string()
    } else {
        text
    }
}

fn find_progress_element(dom: &Dom) -> Option<NodeId> {
    let body = dom.body()?;
    let elements = dom.descendants(body);
    let by_class = |needle: &str| {
        elements
            .iter()
            .copied()
            .find(|n| dom.attr_or_empty(*n, "class").to_lowercase().contains(needle))
    };
    elements
        .iter()
        .copied()
        .find(|n| dom.attr(*n, "role") == Some("progressbar"))
        .or_else(|| by_class("progress"))
        .or_else(|| by_class("stepper"))
        .or_else(|| by_class("step"))
        .or_else(|| by_class("wizard"))
}
