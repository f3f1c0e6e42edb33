// src/dom/walk.rs
//! Composed-tree traversal: light DOM, open shadow roots and (optionally)
//! same-origin frame documents, driven by an explicit worklist.

use super::{Dom, NodeId, NodeKind};
use tracing::{debug, warn};

/// Which kind of tree scope an element was found in, relative to the walk root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Document,
    Shadow,
    Frame,
}

/// Bounds for a composed walk. `max_scope_depth` counts nested shadow/frame
/// boundaries crossed; `max_elements` caps the number of elements yielded.
#[derive(Debug, Clone, Copy)]
pub struct WalkLimits {
    pub max_scope_depth: usize,
    pub max_elements: usize,
    pub enter_frames: bool,
}

impl Default for WalkLimits {
    fn default() -> Self {
        Self {
            max_scope_depth: 16,
            max_elements: 20_000,
            enter_frames: true,
        }
    }
}

pub struct ComposedWalk<'a> {
    dom: &'a Dom,
    stack: Vec<(NodeId, Scope, usize)>,
    limits: WalkLimits,
    yielded: usize,
    truncated: bool,
}

impl<'a> ComposedWalk<'a> {
    /// Walk everything below `root` (the root itself is not yielded).
    pub fn new(dom: &'a Dom, root: NodeId, limits: WalkLimits) -> Self {
        let mut walk = Self {
            dom,
            stack: Vec::new(),
            limits,
            yielded: 0,
            truncated: false,
        };
        walk.expand(root, Scope::Document, 0);
        walk
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// Queue what lies below `node`. Popping order: shadow root, then frame
    /// document, then light children in document order.
    fn expand(&mut self, node: NodeId, scope: Scope, depth: usize) {
        for child in self.dom.children(node).into_iter().rev() {
            self.stack.push((child, scope, depth));
        }
        if !self.dom.is_element(node) {
            return;
        }

        if self.limits.enter_frames && self.dom.is_tag(node, "iframe") {
            match self.dom.content_document(node) {
                Ok(Some(doc)) => self.enter(doc, Scope::Frame, depth),
                Ok(None) => debug!("iframe {} has no document yet", node),
                Err(e) => debug!("skipping iframe {}: {}", node, e),
            }
        }
        if let Some(shadow) = self.dom.shadow_root(node) {
            let inner = if scope == Scope::Frame { Scope::Frame } else { Scope::Shadow };
            self.enter(shadow, inner, depth);
        }
    }

    fn enter(&mut self, root: NodeId, scope: Scope, depth: usize) {
        if depth + 1 > self.limits.max_scope_depth {
            warn!(
                "scope depth limit {} reached at {}, not descending",
                self.limits.max_scope_depth, root
            );
            return;
        }
        self.stack.push((root, scope, depth + 1));
    }
}

impl Iterator for ComposedWalk<'_> {
    type Item = (NodeId, Scope);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((node, scope, depth)) = self.stack.pop() {
            match self.dom.kind(node) {
                Some(NodeKind::Element(_)) => {
                    if self.yielded >= self.limits.max_elements {
                        warn!(
                            "element budget {} exhausted, truncating walk",
                            self.limits.max_elements
                        );
                        self.truncated = true;
                        self.stack.clear();
                        return None;
                    }
                    self.yielded += 1;
                    self.expand(node, scope, depth);
                    return Some((node, scope));
                }
                Some(NodeKind::Document { .. }) | Some(NodeKind::ShadowRoot { .. }) => {
                    for child in self.dom.children(node).into_iter().rev() {
                        self.stack.push((child, scope, depth));
                    }
                }
                Some(NodeKind::Text(_)) | None => {}
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<body>
        <input name="a">
        <div id="host"><template shadowrootmode="open">
            <input name="b">
            <div id="nested"><template shadowrootmode="open"><input name="c"></template></div>
        </template></div>
        <iframe srcdoc="<input name='d'>"></iframe>
        <iframe src="https://other.example/"></iframe>
        <input name="e">
    </body>"#;

    fn names(dom: &Dom, limits: WalkLimits) -> Vec<(String, Scope)> {
        ComposedWalk::new(dom, dom.document(), limits)
            .filter(|(n, _)| dom.is_tag(*n, "input"))
            .map(|(n, s)| (dom.attr_or_empty(n, "name").to_string(), s))
            .collect()
    }

    #[test]
    fn test_walk_visits_all_scopes_in_order() {
        let dom = Dom::parse("https://jobs.example", PAGE).unwrap();
        let found = names(&dom, WalkLimits::default());
        assert_eq!(
            found,
            vec![
                ("a".to_string(), Scope::Document),
                ("b".to_string(), Scope::Shadow),
                ("c".to_string(), Scope::Shadow),
                ("d".to_string(), Scope::Frame),
                ("e".to_string(), Scope::Document),
            ]
        );
    }

    #[test]
    fn test_walk_respects_bounds() {
        let dom = Dom::parse("https://jobs.example", PAGE).unwrap();

        let shallow = WalkLimits {
            max_scope_depth: 1,
            ..WalkLimits::default()
        };
        let found: Vec<String> = names(&dom, shallow).into_iter().map(|(n, _)| n).collect();
        assert_eq!(found, vec!["a", "b", "d", "e"]);

        let no_frames = WalkLimits {
            enter_frames: false,
            ..WalkLimits::default()
        };
        assert!(!names(&dom, no_frames).iter().any(|(n, _)| n == "d"));

        let tiny = WalkLimits {
            max_elements: 3,
            ..WalkLimits::default()
        };
        let mut walk = ComposedWalk::new(&dom, dom.document(), tiny);
        assert_eq!(walk.by_ref().count(), 3);
        assert!(walk.truncated());
    }
}
