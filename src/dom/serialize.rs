// src/dom/serialize.rs
//! HTML serialization with live control state reflected into attributes.

use super::{Dom, NodeId, NodeKind, ShadowMode};

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Pending serialization work. The stack is unwound in document order, so
/// nesting depth never turns into call depth.
enum Step {
    Node(NodeId),
    Literal(String),
}

impl Dom {
    /// Serialize the top-level document.
    pub fn to_html(&self) -> String {
        let mut out = String::from("<!DOCTYPE html>");
        self.write_tree(self.children(self.document), &mut out);
        out
    }

    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_tree(vec![node], &mut out);
        out
    }

    fn write_tree(&self, roots: Vec<NodeId>, out: &mut String) {
        let mut stack: Vec<Step> = roots.into_iter().rev().map(Step::Node).collect();
        while let Some(step) = stack.pop() {
            let node = match step {
                Step::Literal(text) => {
                    out.push_str(&text);
                    continue;
                }
                Step::Node(node) => node,
            };
            match self.kind(node) {
                Some(NodeKind::Text(text)) => {
                    let raw = self
                        .parent(node)
                        .and_then(|p| self.tag(p))
                        .is_some_and(|t| matches!(t, "script" | "style"));
                    if raw {
                        out.push_str(text);
                    } else {
                        out.push_str(&escape(text, false));
                    }
                }
                Some(NodeKind::Element(element)) => {
                    out.push('<');
                    out.push_str(&element.tag);
                    for (name, value) in self.reflected_attrs(node) {
                        out.push(' ');
                        out.push_str(&name);
                        out.push_str("=\"");
                        out.push_str(&escape(&value, true));
                        out.push('"');
                    }
                    out.push('>');
                    if VOID_TAGS.contains(&element.tag.as_str()) {
                        continue;
                    }

                    stack.push(Step::Literal(format!("</{}>", element.tag)));
                    if element.tag == "textarea" {
                        stack.push(Step::Literal(escape(&element.value, false)));
                    } else {
                        stack.extend(self.children(node).into_iter().rev().map(Step::Node));
                    }
                    if let Some(root) = element.shadow_root {
                        let mode = match self.shadow_mode(root) {
                            Some(ShadowMode::Closed) => "closed",
                            _ => "open",
                        };
                        stack.push(Step::Literal("</template>".to_string()));
                        stack.extend(self.children(root).into_iter().rev().map(Step::Node));
                        stack.push(Step::Literal(format!("<template shadowrootmode=\"{}\">", mode)));
                    }
                }
                Some(NodeKind::Document { .. }) | Some(NodeKind::ShadowRoot { .. }) => {
                    stack.extend(self.children(node).into_iter().rev().map(Step::Node));
                }
                None => {}
            }
        }
    }

    fn reflected_attrs(&self, node: NodeId) -> Vec<(String, String)> {
        let Some(element) = self.element(node) else {
            return Vec::new();
        };
        let mut attrs: Vec<(String, String)> = element
            .attrs
            .iter()
            .filter(|(name, _)| !matches!(name.as_str(), "value" | "checked" | "selected"))
            .cloned()
            .collect();

        match element.tag.as_str() {
            "input" => {
                let ty = self.input_type(node).unwrap_or_default();
                if matches!(ty.as_str(), "checkbox" | "radio") {
                    if let Some(value) = self.attr(node, "value") {
                        attrs.push(("value".to_string(), value.to_string()));
                    }
                    if element.checked {
                        attrs.push(("checked".to_string(), String::new()));
                    }
                } else if !element.value.is_empty() || self.has_attr(node, "value") {
                    attrs.push(("value".to_string(), element.value.clone()));
                }
            }
            "option" => {
                if let Some(value) = self.attr(node, "value") {
                    attrs.push(("value".to_string(), value.to_string()));
                }
                if element.selected {
                    attrs.push(("selected".to_string(), String::new()));
                }
            }
            _ => {
                attrs.extend(
                    element
                        .attrs
                        .iter()
                        .filter(|(name, _)| matches!(name.as_str(), "value" | "checked" | "selected"))
                        .cloned(),
                );
            }
        }
        attrs
    }
}

fn escape(text: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
