// src/detection/locator.rs
//! Finds the job-application form on a page and scores how likely each
//! candidate container is to be one.

use crate::adapters::Adapter;
use crate::config::EngineConfig;
use crate::dom::{ComposedWalk, Dom, NodeId, Scope};
use crate::fields::controls;
use crate::utils::contains_any;
use serde::Serialize;
use tracing::{debug, info};

/// Words that mark an application form in ids, classes and actions
pub const FORM_KEYWORDS: &[&str] = &[
    "application",
    "apply",
    "job",
    "career",
    "candidate",
    "resume",
    "cv",
    "employment",
    "recruit",
    "hiring",
];

const IMPLICIT_TAGS: &[&str] = &["div", "section", "main", "article", "fieldset"];

/// Fillable controls that make a container a form even without keywords
const IMPLICIT_MIN_FIELDS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DetectedForm {
    pub container: NodeId,
    pub confidence: i32,
    /// A container found without a `<form>` element
    pub implicit: bool,
    /// Selected by the adapter's form hint
    pub hinted: bool,
}

pub struct FormLocator<'a> {
    config: &'a EngineConfig,
    adapter: Option<&'a Adapter>,
}

impl<'a> FormLocator<'a> {
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

    /// The most likely application form, or `None` when no candidate clears
    /// the form threshold
    pub fn detect(&self, dom: &Dom) -> Option<DetectedForm> {
        if let Some(hinted) = self.hinted_form(dom) {
            return Some(hinted);
        }

        let (candidates, implicit) = self.candidates(dom);
        if candidates.is_empty() {
            info!("No form candidates on page");
            return None;
        }

        let mut best: Option<(NodeId, i32)> = None;
        for candidate in candidates {
            let score = self.score(dom, candidate);
            debug!("Form candidate {} scored {}", candidate, score);
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((candidate, score));
            }
        }

        let (container, confidence) = best?;
        if confidence > self.config.thresholds.form_score {
            info!(
                "Application form detected: {} (confidence {}, implicit {})",
                container, confidence, implicit
            );
            Some(DetectedForm {
                container,
                confidence,
                implicit,
                hinted: false,
            })
        } else {
            info!(
                "No clear application form (best score {} at {})",
                confidence, container
            );
            None
        }
    }

    fn hinted_form(&self, dom: &Dom) -> Option<DetectedForm> {
        let selector = self.adapter?.form_selector()?;
        let limits = self.config.walk_limits(true);
        let container = ComposedWalk::new(dom, dom.document(), limits)
            .map(|(node, _)| node)
            .find(|node| selector.matches(dom, *node))?;
        let confidence = self.score(dom, container);
        info!(
            "Form selected by {} hint: {} (confidence {})",
            self.adapter.map(|a| a.name.as_str()).unwrap_or_default(),
            container,
            confidence
        );
        Some(DetectedForm {
            container,
            confidence,
            implicit: false,
            hinted: true,
        })
    }

    /// Candidate containers in order: document forms, shadow-tree forms,
    /// frame forms. Falls back to implicit containers when there is no form.
    pub fn candidates(&self, dom: &Dom) -> (Vec<NodeId>, bool) {
        let mut document_forms = Vec::new();
        let mut shadow_forms = Vec::new();
        let mut frame_forms = Vec::new();

        for (node, scope) in ComposedWalk::new(dom, dom.document(), self.config.walk_limits(true)) {
            if !dom.is_tag(node, "form") {
                continue;
            }
            match scope {
                Scope::Document => document_forms.push(node),
                Scope::Shadow => shadow_forms.push(node),
                Scope::Frame => frame_forms.push(node),
            }
        }

        let mut forms = document_forms;
        forms.extend(shadow_forms);
        forms.extend(frame_forms);
        if !forms.is_empty() {
            return (forms, false);
        }

        debug!("No <form> elements, searching for implicit containers");
        (self.implicit_candidates(dom), true)
    }

    fn implicit_candidates(&self, dom: &Dom) -> Vec<NodeId> {
        let limits = self.config.walk_limits(false);
        let found: Vec<(NodeId, usize, bool)> = dom
            .descendants(dom.document())
            .into_iter()
            .filter(|n| IMPLICIT_TAGS.iter().any(|t| dom.is_tag(*n, t)))
            .filter_map(|n| {
                let count = controls(dom, n, limits).len();
                let marker = format!(
                    "{} {}",
                    dom.attr_or_empty(n, "id"),
                    dom.attr_or_empty(n, "class")
                )
                .to_lowercase();
                let keyword = contains_any(&marker, FORM_KEYWORDS) || marker.contains("form");
                (keyword || count >= IMPLICIT_MIN_FIELDS).then_some((n, count, keyword))
            })
            .collect();

        // an unmarked wrapper holding exactly the controls of a nested candidate adds nothing
        found
            .iter()
            .filter(|(outer, count, keyword)| {
                *keyword
                    || !found
                        .iter()
                        .any(|(inner, c, _)| c == count && dom.is_descendant_of(*inner, *outer))
            })
            .map(|(n, _, _)| *n)
            .collect()
    }

    /// Additive heuristic score of a container
    pub fn score(&self, dom: &Dom, container: NodeId) -> i32 {
        let mut score = 0;

        let marker = format!(
            "{}{}",
            dom.attr_or_empty(container, "id"),
            dom.attr_or_empty(container, "class")
        )
        .to_lowercase();
        score += 3 * FORM_KEYWORDS.iter().filter(|k| marker.contains(*k)).count() as i32;

        let action = dom.attr_or_empty(container, "action").to_lowercase();
        if contains_any(&action, FORM_KEYWORDS) {
            score += 2;
        }

        let limits = self.config.walk_limits(true);
        let fields = controls(dom, container, limits);
        let inputs: Vec<NodeId> = fields
            .iter()
            .copied()
            .filter(|n| dom.is_tag(*n, "input"))
            .collect();
        let attr = |n: NodeId, name: &str| dom.attr_or_empty(n, name).to_lowercase();
        let ty = |n: NodeId| dom.input_type(n).unwrap_or_default();

        if inputs
            .iter()
            .any(|n| attr(*n, "name").contains("name") || attr(*n, "placeholder").contains("name"))
        {
            score += 1;
        }
        if inputs
            .iter()
            .any(|n| ty(*n) == "email" || attr(*n, "name").contains("email"))
        {
            score += 1;
        }
        if inputs
            .iter()
            .any(|n| ty(*n) == "tel" || attr(*n, "name").contains("phone"))
        {
            score += 1;
        }
        if inputs.iter().any(|n| {
            (ty(*n) == "file" && attr(*n, "accept").contains("pdf"))
                || attr(*n, "name").contains("resume")
                || attr(*n, "name").contains("cv")
        }) {
            score += 2;
        }

        let text = dom.text_content(container).to_lowercase();
        if text.contains("apply") || text.contains("application") {
            score += 1;
        }

        if let Some(submit) = first_submit(dom, container) {
            let caption = if dom.is_tag(submit, "input") {
                attr(submit, "value")
            } else {
                dom.text_content(submit).to_lowercase()
            };
            if caption.contains("apply") || caption.contains("submit application") {
                score += 2;
            }
        }

        if fields.len() >= 10 {
            score += 1;
        }
        if fields.len() >= 20 {
            score += 1;
        }
        score
    }
}

/// First control that submits the container: an explicit submit button or
/// input, or a `<button>` without a type
fn first_submit(dom: &Dom, container: NodeId) -> Option<NodeId> {
    dom.descendants(container).into_iter().find(|n| {
        let ty = dom.attr_or_empty(*n, "type").trim().to_ascii_lowercase();
        (dom.is_tag(*n, "button") && (ty.is_empty() || ty == "submit"))
            || (dom.is_tag(*n, "input") && ty == "submit")
    })
}
