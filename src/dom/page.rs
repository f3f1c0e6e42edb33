// src/dom/page.rs
//! A loaded page: the DOM plus the host page's own scripts, the dispatched
//! event log, focus, scroll position and the mutation cursor used by the
//! session's mutation watcher.

use super::{Dom, NodeId};
use anyhow::{Context, Result};
use serde::Serialize;
use tracing::trace;

/// Viewport height used to center `scroll_into_view`.
const VIEWPORT_HEIGHT: f64 = 800.0;

/// Most events kept in the log; the oldest half is dropped when it fills.
pub const EVENT_LOG_CAPACITY: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Focus,
    Blur,
    Input,
    Change,
    Click,
}

impl EventKind {
    pub fn bubbles(self) -> bool {
        !matches!(self, EventKind::Focus | EventKind::Blur)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomEvent {
    pub target: NodeId,
    pub kind: EventKind,
    pub bubbles: bool,
}

/// Code owned by the host page: framework change detection, wizard
/// navigation, validation hooks. Scripts see every dispatched event and may
/// mutate the DOM in response.
pub trait PageScript {
    fn install(&mut self, _dom: &mut Dom) {}

    fn on_event(&mut self, dom: &mut Dom, event: &DomEvent);
}

pub struct Page {
    url: String,
    dom: Dom,
    scripts: Vec<Box<dyn PageScript>>,
    events: Vec<DomEvent>,
    seen_mutations: u64,
    focused: Option<NodeId>,
    scroll_y: f64,
}

impl Page {
    pub fn from_html(url: &str, html: &str) -> Result<Self> {
        let dom = Dom::parse(url, html).with_context(|| format!("Failed to parse page {}", url))?;
        Ok(Self::new(url, dom))
    }

    pub fn new(url: &str, dom: Dom) -> Self {
        let seen_mutations = dom.mutation_count();
        Self {
            url: url.to_string(),
            dom,
            scripts: Vec::new(),
            events: Vec::new(),
            seen_mutations,
            focused: None,
            scroll_y: 0.0,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn dom(&self) -> &Dom {
        &self.dom
    }

    pub fn dom_mut(&mut self) -> &mut Dom {
        &mut self.dom
    }

    pub fn add_script<S: PageScript + 'static>(&mut self, mut script: S) {
        script.install(&mut self.dom);
        self.scripts.push(Box::new(script));
    }

    /// Dispatch a synthetic event to the target; every page script observes it.
    pub fn dispatch(&mut self, target: NodeId, kind: EventKind) {
        let event = DomEvent {
            target,
            kind,
            bubbles: kind.bubbles(),
        };
        trace!("dispatch {:?} on {}", kind, target);
        for script in self.scripts.iter_mut() {
            script.on_event(&mut self.dom, &event);
        }
        if self.events.len() >= EVENT_LOG_CAPACITY {
            self.events.drain(..EVENT_LOG_CAPACITY / 2);
        }
        self.events.push(event);
    }

    pub fn focus(&mut self, node: NodeId) {
        if let Some(previous) = self.focused.filter(|p| *p != node) {
            self.dispatch(previous, EventKind::Blur);
        }
        self.focused = Some(node);
        self.dispatch(node, EventKind::Focus);
    }

    pub fn blur(&mut self, node: NodeId) {
        if self.focused == Some(node) {
            self.focused = None;
        }
        self.dispatch(node, EventKind::Blur);
    }

    pub fn click(&mut self, node: NodeId) {
        self.dispatch(node, EventKind::Click);
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    /// Scroll so that the node sits in the middle of the viewport.
    pub fn scroll_into_view(&mut self, node: NodeId) {
        let rect = self.dom.rect(node);
        self.scroll_y = (rect.top - VIEWPORT_HEIGHT / 2.0).max(0.0);
    }

    pub fn scroll_y(&self) -> f64 {
        self.scroll_y
    }

    pub fn events(&self) -> &[DomEvent] {
        &self.events
    }

    /// Events dispatched on one node, in order.
    pub fn events_for(&self, node: NodeId) -> Vec<EventKind> {
        self.events
            .iter()
            .filter(|e| e.target == node)
            .map(|e| e.kind)
            .collect()
    }

    /// Hand the event log to the caller, leaving it empty.
    pub fn take_events(&mut self) -> Vec<DomEvent> {
        std::mem::take(&mut self.events)
    }

    /// Mutations recorded since the previous call.
    pub fn take_mutations(&mut self) -> u64 {
        let now = self.dom.mutation_count();
        let delta = now.saturating_sub(self.seen_mutations);
        self.seen_mutations = now;
        delta
    }

    pub fn to_html(&self) -> String {
        self.dom.to_html()
    }
}
