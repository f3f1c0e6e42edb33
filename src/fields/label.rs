// src/fields/label.rs
//! Human-readable identity of a form control.

use crate::dom::{Dom, NodeId};
use crate::utils::{clean_label_text, collapse_whitespace};

/// Tags whose text never belongs to a label
const NON_LABEL_CONTENT: &[&str] = &["select", "textarea", "option", "button"];

const CONTROL_TAGS: &[&str] = &["input", "select", "textarea", "button"];

/// Resolve the identifier of a control by walking the label chain; the first
/// non-empty source wins and the tag name is the last resort.
pub fn resolve_identifier(dom: &Dom, control: NodeId) -> String {
    let chain: [fn(&Dom, NodeId) -> Option<String>; 8] = [
        label_for,
        ancestor_label,
        preceding_label,
        aria_label,
        aria_labelledby,
        placeholder,
        name_attr,
        id_attr,
    ];

    chain
        .iter()
        .find_map(|source| source(dom, control))
        .unwrap_or_else(|| dom.tag(control).unwrap_or_default().to_string())
}

fn label_text(dom: &Dom, label: NodeId) -> Option<String> {
    non_empty(clean_label_text(
        &dom.text_content_excluding(label, NON_LABEL_CONTENT),
    ))
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// `<label for=...>` in the control's own tree scope
fn label_for(dom: &Dom, control: NodeId) -> Option<String> {
    let id = dom.attr(control, "id").filter(|id| !id.is_empty())?;
    dom.descendants(dom.tree_root(control))
        .into_iter()
        .filter(|n| dom.is_tag(*n, "label") && dom.attr(*n, "for") == Some(id))
        .find_map(|label| label_text(dom, label))
}

fn ancestor_label(dom: &Dom, control: NodeId) -> Option<String> {
    let label = dom
        .ancestors(control)
        .into_iter()
        .find(|a| dom.is_tag(*a, "label"))?;
    label_text(dom, label)
}

/// Nearest preceding sibling `<label>`, unless another control sits between
fn preceding_label(dom: &Dom, control: NodeId) -> Option<String> {
    let mut current = dom.previous_element_sibling(control);
    while let Some(sibling) = current {
        if dom.is_tag(sibling, "label") {
            return label_text(dom, sibling);
        }
        if CONTROL_TAGS.iter().any(|t| dom.is_tag(sibling, t)) {
            return None;
        }
        current = dom.previous_element_sibling(sibling);
    }
    None
}

fn aria_label(dom: &Dom, control: NodeId) -> Option<String> {
    non_empty(clean_label_text(dom.attr(control, "aria-label")?))
}

fn aria_labelledby(dom: &Dom, control: NodeId) -> Option<String> {
    let ids = dom.attr(control, "aria-labelledby")?;
    let scope = dom.tree_root(control);
    let texts: Vec<String> = ids
        .split_whitespace()
        .filter_map(|id| dom.element_by_id(scope, id))
        .filter_map(|target| label_text(dom, target))
        .collect();
    non_empty(texts.join(" "))
}

fn placeholder(dom: &Dom, control: NodeId) -> Option<String> {
    non_empty(clean_label_text(dom.attr(control, "placeholder")?))
}

fn name_attr(dom: &Dom, control: NodeId) -> Option<String> {
    non_empty(collapse_whitespace(dom.attr(control, "name")?))
}

fn id_attr(dom: &Dom, control: NodeId) -> Option<String> {
    non_empty(collapse_whitespace(dom.attr(control, "id")?))
}
