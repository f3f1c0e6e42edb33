// src/dom/mod.rs
//! In-memory page model: an arena DOM with shadow roots, frames and the live
//! state of form controls (values, checked flags, framework value trackers).

mod page;
mod parse;
pub mod selector;
mod serialize;
mod validity;
mod walk;

pub use page::{DomEvent, EventKind, Page, PageScript, EVENT_LOG_CAPACITY};
pub use selector::Selector;
pub use walk::{ComposedWalk, Scope, WalkLimits};

use anyhow::{Context, Result};
use indextree::Arena;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Height of one flow row when an element has no measured or styled position.
pub const FLOW_ROW_HEIGHT: f64 = 24.0;

/// Handle to a node of a [`Dom`]. Serialized as its arena index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(indextree::NodeId);

impl NodeId {
    /// Arena index; nodes are created in document order.
    fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.index())
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.index() as u64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowMode {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn at(top: f64, left: f64) -> Self {
        Self {
            top,
            left,
            width: 0.0,
            height: FLOW_ROW_HEIGHT,
        }
    }
}

/// Content of an `<iframe>` as seen from the embedding page.
#[derive(Debug, Clone)]
pub enum Frame {
    Loaded(NodeId),
    /// Same-origin frame whose document has not been attached yet.
    Unloaded,
    CrossOrigin { origin: String },
}

/// Payload of an arena node. Documents and shadow roots are arena roots;
/// their hosts point at them instead of parenting them.
#[derive(Debug, Clone)]
enum NodeKind {
    Document { origin: String, owner: Option<NodeId> },
    ShadowRoot { host: NodeId, mode: ShadowMode },
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct Element {
    tag: String,
    attrs: Vec<(String, String)>,
    value: String,
    checked: bool,
    selected: bool,
    /// Value last recorded by an instance-level setter a page framework installed.
    value_tracker: Option<String>,
    shadow_root: Option<NodeId>,
    frame: Option<Frame>,
    rect: Option<Rect>,
}

#[derive(Debug, Clone)]
pub struct Dom {
    arena: Arena<NodeKind>,
    document: NodeId,
    mutations: u64,
}

impl Dom {
    /// Parse a full HTML document. `url` decides the origin used for iframe
    /// access checks; an unparsable URL yields an opaque origin.
    pub fn parse(url: &str, html: &str) -> Result<Self> {
        let base = url::Url::parse(url).ok();
        let origin = base
            .as_ref()
            .map(|u| u.origin().ascii_serialization())
            .unwrap_or_else(|| "null".to_string());

        let mut arena = Arena::new();
        let document = NodeId(arena.new_node(NodeKind::Document { origin, owner: None }));
        let mut dom = Self {
            arena,
            document,
            mutations: 0,
        };
        parse::load_document(&mut dom, document, html, base.as_ref())?;
        dom.mutations = 0;
        Ok(dom)
    }

    pub fn document(&self) -> NodeId {
        self.document
    }

    pub fn origin_of(&self, node: NodeId) -> &str {
        match self.kind(self.tree_root(node)) {
            Some(NodeKind::Document { origin, .. }) => origin,
            Some(NodeKind::ShadowRoot { host, .. }) => self.origin_of(*host),
            _ => "null",
        }
    }

    /// Number of structural or attribute mutations since parsing.
    pub fn mutation_count(&self) -> u64 {
        self.mutations
    }

    fn kind(&self, node: NodeId) -> Option<&NodeKind> {
        self.arena.get(node.0).map(|n| n.get())
    }

    fn new_node(&mut self, parent: Option<NodeId>, kind: NodeKind) -> NodeId {
        let id = self.arena.new_node(kind);
        if let Some(parent) = parent {
            parent.0.append(id, &mut self.arena);
        }
        NodeId(id)
    }

    fn create_document(&mut self, origin: String, owner: Option<NodeId>) -> NodeId {
        self.new_node(None, NodeKind::Document { origin, owner })
    }

    fn create_shadow_root(&mut self, host: NodeId, mode: ShadowMode) -> Result<NodeId> {
        let root = self.new_node(None, NodeKind::ShadowRoot { host, mode });
        self.element_or_err(host)?.shadow_root = Some(root);
        Ok(root)
    }

    fn create_element(&mut self, parent: NodeId, tag: &str, attrs: Vec<(String, String)>) -> NodeId {
        let value = attrs
            .iter()
            .find(|(name, _)| name == "value")
            .map(|(_, v)| v.clone())
            .unwrap_or_default();
        let checked = attrs.iter().any(|(name, _)| name == "checked");
        let selected = attrs.iter().any(|(name, _)| name == "selected");
        let element = Element {
            tag: tag.to_ascii_lowercase(),
            attrs,
            value,
            checked,
            selected,
            value_tracker: None,
            shadow_root: None,
            frame: None,
            rect: None,
        };
        self.new_node(Some(parent), NodeKind::Element(element))
    }

    fn create_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.new_node(Some(parent), NodeKind::Text(text.to_string()))
    }

    fn element(&self, node: NodeId) -> Option<&Element> {
        match self.kind(node)? {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, node: NodeId) -> Option<&mut Element> {
        match self.arena.get_mut(node.0)?.get_mut() {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element_or_err(&mut self, node: NodeId) -> Result<&mut Element> {
        self.element_mut(node)
            .with_context(|| format!("{} is not an element", node))
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        self.element(node).is_some()
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|e| e.tag.as_str())
    }

    pub fn is_tag(&self, node: NodeId, tag: &str) -> bool {
        self.tag(node) == Some(tag)
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?
            .attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, node: NodeId, name: &str) -> bool {
        self.attr(node, name).is_some()
    }

    /// Attribute value or the empty string.
    pub fn attr_or_empty(&self, node: NodeId, name: &str) -> &str {
        self.attr(node, name).unwrap_or("")
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) -> Result<()> {
        let element = self.element_or_err(node)?;
        match element.attrs.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value.to_string(),
            None => element.attrs.push((name.to_string(), value.to_string())),
        }
        self.mutations += 1;
        Ok(())
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) -> Result<()> {
        let element = self.element_or_err(node)?;
        let before = element.attrs.len();
        element.attrs.retain(|(n, _)| n != name);
        if element.attrs.len() != before {
            self.mutations += 1;
        }
        Ok(())
    }

    /// Lowercased `type` of an `<input>`, defaulting to "text".
    pub fn input_type(&self, node: NodeId) -> Option<String> {
        if !self.is_tag(node, "input") {
            return None;
        }
        let ty = self.attr_or_empty(node, "type").trim().to_ascii_lowercase();
        Some(if ty.is_empty() { "text".to_string() } else { ty })
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.arena.get(node.0)?.parent().map(NodeId)
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        node.0.children(&self.arena).map(NodeId).collect()
    }

    pub fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        node.0
            .children(&self.arena)
            .map(NodeId)
            .filter(|c| self.is_element(*c))
            .collect()
    }

    pub fn previous_element_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.parent(node)?;
        node.0
            .preceding_siblings(&self.arena)
            .skip(1)
            .map(NodeId)
            .find(|s| self.is_element(*s))
    }

    /// Element ancestors inside the node's own tree scope, nearest first.
    pub fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        node.0
            .ancestors(&self.arena)
            .skip(1)
            .map(NodeId)
            .filter(|a| self.is_element(*a))
            .collect()
    }

    pub fn is_descendant_of(&self, node: NodeId, ancestor: NodeId) -> bool {
        node.0.ancestors(&self.arena).skip(1).any(|a| a == ancestor.0)
    }

    /// The document or shadow root at the top of the node's tree scope.
    pub fn tree_root(&self, node: NodeId) -> NodeId {
        node.0
            .ancestors(&self.arena)
            .last()
            .map(NodeId)
            .unwrap_or(node)
    }

    pub fn is_document(&self, node: NodeId) -> bool {
        matches!(self.kind(node), Some(NodeKind::Document { .. }))
    }

    /// Whether the node is reachable from the top-level document, crossing
    /// shadow hosts and frame owners.
    pub fn is_connected(&self, node: NodeId) -> bool {
        let mut current = node;
        loop {
            let root = self.tree_root(current);
            match self.kind(root) {
                Some(NodeKind::Document { owner: None, .. }) => return root == self.document,
                Some(NodeKind::Document {
                    owner: Some(iframe),
                    ..
                }) => current = *iframe,
                Some(NodeKind::ShadowRoot { host, .. }) => current = *host,
                _ => return false,
            }
        }
    }

    /// Open shadow root of `host`; closed roots are not reachable from scripts.
    pub fn shadow_root(&self, host: NodeId) -> Option<NodeId> {
        let root = self.element(host)?.shadow_root?;
        match self.kind(root)? {
            NodeKind::ShadowRoot {
                mode: ShadowMode::Open,
                ..
            } => Some(root),
            _ => None,
        }
    }

    fn shadow_mode(&self, root: NodeId) -> Option<ShadowMode> {
        match self.kind(root)? {
            NodeKind::ShadowRoot { mode, .. } => Some(*mode),
            _ => None,
        }
    }

    pub fn shadow_host(&self, root: NodeId) -> Option<NodeId> {
        match self.kind(root)? {
            NodeKind::ShadowRoot { host, .. } => Some(*host),
            _ => None,
        }
    }

    pub fn attach_shadow(&mut self, host: NodeId, mode: ShadowMode) -> Result<NodeId> {
        if let Some(existing) = self.element(host).and_then(|e| e.shadow_root) {
            anyhow::bail!("{} already hosts shadow root {}", host, existing);
        }
        let root = self.create_shadow_root(host, mode)?;
        self.mutations += 1;
        Ok(root)
    }

    /// Document of an `<iframe>`. Cross-origin frames fail the way the
    /// platform does; unloaded same-origin frames yield `None`.
    pub fn content_document(&self, iframe: NodeId) -> Result<Option<NodeId>> {
        let element = self
            .element(iframe)
            .with_context(|| format!("{} is not an element", iframe))?;
        match &element.frame {
            Some(Frame::Loaded(doc)) => Ok(Some(*doc)),
            Some(Frame::Unloaded) | None => Ok(None),
            Some(Frame::CrossOrigin { origin }) => anyhow::bail!(
                "Blocked a frame with origin \"{}\" from accessing a cross-origin frame ({})",
                self.origin_of(iframe),
                origin
            ),
        }
    }

    /// Attach a same-origin document to an iframe, as a host does once the
    /// frame has loaded.
    pub fn attach_frame_document(&mut self, iframe: NodeId, html: &str) -> Result<NodeId> {
        if !self.is_tag(iframe, "iframe") {
            anyhow::bail!("{} is not an iframe", iframe);
        }
        if let Some(Frame::CrossOrigin { origin }) = self.element(iframe).and_then(|e| e.frame.clone()) {
            anyhow::bail!("cannot attach a document to cross-origin frame {}", origin);
        }
        let origin = self.origin_of(iframe).to_string();
        let doc = self.create_document(origin, Some(iframe));
        parse::load_document(self, doc, html, None)?;
        self.element_or_err(iframe)?.frame = Some(Frame::Loaded(doc));
        self.mutations += 1;
        Ok(doc)
    }

    pub fn frame_owner(&self, document: NodeId) -> Option<NodeId> {
        match self.kind(document)? {
            NodeKind::Document { owner, .. } => *owner,
            _ => None,
        }
    }

    /// Light-tree element descendants of `root` in document order. Shadow trees
    /// and frame documents are not entered.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        root.0
            .descendants(&self.arena)
            .skip(1)
            .map(NodeId)
            .filter(|n| self.is_element(*n))
            .collect()
    }

    pub fn body(&self) -> Option<NodeId> {
        self.body_of(self.document)
    }

    pub fn body_of(&self, document: NodeId) -> Option<NodeId> {
        document
            .0
            .descendants(&self.arena)
            .map(NodeId)
            .find(|n| self.is_tag(*n, "body"))
    }

    /// `getElementById` scoped to a document or shadow root.
    pub fn element_by_id(&self, scope: NodeId, id: &str) -> Option<NodeId> {
        if id.is_empty() {
            return None;
        }
        scope
            .0
            .descendants(&self.arena)
            .skip(1)
            .map(NodeId)
            .find(|n| self.attr(*n, "id") == Some(id))
    }

    /// Light-tree text of a node. Script and style contents are left out.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &[], &mut out);
        out
    }

    /// Text content that skips the subtrees of the given tags.
    pub fn text_content_excluding(&self, node: NodeId, skip_tags: &[&str]) -> String {
        let mut out = String::new();
        self.collect_text(node, skip_tags, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, skip_tags: &[&str], out: &mut String) {
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            match self.kind(current) {
                Some(NodeKind::Text(text)) => out.push_str(text),
                Some(NodeKind::Element(element))
                    if current != node
                        && (matches!(element.tag.as_str(), "script" | "style")
                            || skip_tags.contains(&element.tag.as_str())) => {}
                Some(_) => stack.extend(current.0.children(&self.arena).rev().map(NodeId)),
                None => {}
            }
        }
    }

    /// Replace all children with a single text node.
    pub fn set_text_content(&mut self, node: NodeId, text: &str) -> Result<()> {
        self.clear_children(node);
        if !text.is_empty() {
            self.create_text(node, text);
        }
        self.mutations += 1;
        Ok(())
    }

    fn clear_children(&mut self, node: NodeId) {
        for child in self.children(node) {
            child.0.detach(&mut self.arena);
        }
    }

    /// Parse `html` as a fragment and replace the children of `node` with it.
    pub fn set_inner_html(&mut self, node: NodeId, html: &str) -> Result<Vec<NodeId>> {
        self.clear_children(node);
        self.append_html(node, html)
    }

    /// Parse `html` as a fragment and append it to `parent`. Returns the new
    /// top-level nodes.
    pub fn append_html(&mut self, parent: NodeId, html: &str) -> Result<Vec<NodeId>> {
        let before = parent.0.children(&self.arena).count();
        parse::load_fragment(self, parent, html)?;
        self.mutations += 1;
        Ok(self.children(parent).split_off(before))
    }

    /// Detach a node from its parent.
    pub fn remove(&mut self, node: NodeId) -> Result<()> {
        self.parent(node)
            .with_context(|| format!("{} has no parent", node))?;
        node.0.detach(&mut self.arena);
        self.mutations += 1;
        Ok(())
    }

    pub fn is_disabled(&self, node: NodeId) -> bool {
        self.has_attr(node, "disabled")
            || self
                .ancestors(node)
                .into_iter()
                .any(|a| self.is_tag(a, "fieldset") && self.has_attr(a, "disabled"))
    }

    pub fn is_readonly(&self, node: NodeId) -> bool {
        self.has_attr(node, "readonly")
    }

    pub fn is_content_editable(&self, node: NodeId) -> bool {
        matches!(
            self.attr(node, "contenteditable")
                .map(|v| v.trim().to_ascii_lowercase())
                .as_deref(),
            Some("") | Some("true") | Some("plaintext-only")
        )
    }

    /// Current value: the live value for inputs and textareas, the selected
    /// option's value for selects.
    pub fn value(&self, node: NodeId) -> String {
        if self.is_tag(node, "select") {
            return self
                .selected_option(node)
                .map(|opt| self.option_value(opt))
                .unwrap_or_default();
        }
        self.element(node).map(|e| e.value.clone()).unwrap_or_default()
    }

    /// Write through the element prototype's value setter. Instance-level
    /// trackers a page framework installed are not touched, so the framework
    /// notices the new value on the next `input` event.
    pub fn set_value_native(&mut self, node: NodeId, value: &str) -> Result<()> {
        if self.is_tag(node, "select") {
            let option = self
                .options(node)
                .into_iter()
                .find(|opt| self.option_value(*opt) == value)
                .with_context(|| format!("no option with value {:?}", value))?;
            return self.select_option(node, option);
        }
        self.element_or_err(node)?.value = value.to_string();
        Ok(())
    }

    /// Write through the element's own (possibly framework-shadowed) setter,
    /// as page code assigning `el.value` does. The framework records the value
    /// too and treats the write as already known.
    pub fn set_value_via_instance(&mut self, node: NodeId, value: &str) -> Result<()> {
        let element = self.element_or_err(node)?;
        element.value = value.to_string();
        if element.value_tracker.is_some() {
            element.value_tracker = Some(value.to_string());
        }
        Ok(())
    }

    pub fn install_value_tracker(&mut self, node: NodeId) -> Result<()> {
        let element = self.element_or_err(node)?;
        element.value_tracker = Some(element.value.clone());
        Ok(())
    }

    pub fn value_tracker(&self, node: NodeId) -> Option<&str> {
        self.element(node)?.value_tracker.as_deref()
    }

    pub fn update_value_tracker(&mut self, node: NodeId, value: &str) -> Result<()> {
        self.element_or_err(node)?.value_tracker = Some(value.to_string());
        Ok(())
    }

    pub fn checked(&self, node: NodeId) -> bool {
        self.element(node).map(|e| e.checked).unwrap_or(false)
    }

    /// Set the checked state. Checking a radio unchecks the rest of its group.
    pub fn set_checked(&mut self, node: NodeId, checked: bool) -> Result<()> {
        if checked && self.input_type(node).as_deref() == Some("radio") {
            for other in self.radio_group(node) {
                if other != node {
                    self.element_or_err(other)?.checked = false;
                }
            }
        }
        self.element_or_err(node)?.checked = checked;
        Ok(())
    }

    /// Radios sharing the node's `name` within its tree scope, the node included.
    pub fn radio_group(&self, radio: NodeId) -> Vec<NodeId> {
        let name = self.attr_or_empty(radio, "name");
        if name.is_empty() {
            return vec![radio];
        }
        self.descendants(self.tree_root(radio))
            .into_iter()
            .filter(|n| {
                self.input_type(*n).as_deref() == Some("radio") && self.attr(*n, "name") == Some(name)
            })
            .collect()
    }

    pub fn options(&self, select: NodeId) -> Vec<NodeId> {
        self.descendants(select)
            .into_iter()
            .filter(|n| self.is_tag(*n, "option"))
            .collect()
    }

    pub fn option_value(&self, option: NodeId) -> String {
        match self.attr(option, "value") {
            Some(value) => value.to_string(),
            None => self.option_text(option),
        }
    }

    pub fn option_text(&self, option: NodeId) -> String {
        crate::utils::collapse_whitespace(&self.text_content(option))
    }

    pub fn selected_option(&self, select: NodeId) -> Option<NodeId> {
        let options = self.options(select);
        options
            .iter()
            .copied()
            .find(|opt| self.element(*opt).map(|e| e.selected).unwrap_or(false))
            .or_else(|| options.first().copied())
    }

    pub fn select_option(&mut self, select: NodeId, option: NodeId) -> Result<()> {
        if !self.is_descendant_of(option, select) {
            anyhow::bail!("{} is not an option of {}", option, select);
        }
        for opt in self.options(select) {
            self.element_or_err(opt)?.selected = opt == option;
        }
        Ok(())
    }

    pub fn set_rect(&mut self, node: NodeId, rect: Rect) -> Result<()> {
        self.element_or_err(node)?.rect = Some(rect);
        Ok(())
    }

    /// Bounding rectangle: host-measured if set, else inline `top`/`left`
    /// style pixels, else a flow position from document order. Frame content
    /// is offset by its iframe.
    pub fn rect(&self, node: NodeId) -> Rect {
        if let Some(rect) = self.element(node).and_then(|e| e.rect) {
            return rect;
        }
        let style = self.attr_or_empty(node, "style");
        let left = style_px(style, "left").unwrap_or(0.0);
        match style_px(style, "top") {
            Some(top) => {
                // styled positions are relative to the frame viewport
                let offset = self
                    .frame_owner(self.tree_root(node))
                    .map(|iframe| self.rect(iframe))
                    .unwrap_or_default();
                Rect::at(top + offset.top, left + offset.left)
            }
            // arena order follows document order, frame content included
            None => Rect::at(node.index() as f64 * FLOW_ROW_HEIGHT, left),
        }
    }

    pub fn select(&self, root: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|n| selector.matches(self, *n))
            .collect()
    }

    pub fn select_first(&self, root: NodeId, selector: &Selector) -> Option<NodeId> {
        self.descendants(root)
            .into_iter()
            .find(|n| selector.matches(self, *n))
    }

    /// Parse `selector` and run it under `root`.
    pub fn query(&self, root: NodeId, selector: &str) -> Result<Vec<NodeId>> {
        let selector = Selector::parse(selector)?;
        Ok(self.select(root, &selector))
    }
}

/// Pixel value of `prop` in an inline style declaration such as `top: 40px`.
fn style_px(style: &str, prop: &str) -> Option<f64> {
    style.split(';').find_map(|decl| {
        let (name, value) = decl.split_once(':')?;
        if !name.trim().eq_ignore_ascii_case(prop) {
            return None;
        }
        value.trim().trim_end_matches("px").trim().parse().ok()
    })
}
