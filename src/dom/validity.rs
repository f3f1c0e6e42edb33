// src/dom/validity.rs
//! Constraint validation (`checkValidity`) for form controls.

use super::{Dom, NodeId};
use regex::Regex;
use std::sync::LazyLock;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+$").expect("static email regex")
});

impl Dom {
    /// Whether the control satisfies its constraints. Disabled controls and
    /// non-controls are always valid.
    pub fn check_validity(&self, node: NodeId) -> bool {
        let Some(tag) = self.tag(node) else {
            return true;
        };
        if self.is_disabled(node) {
            return true;
        }
        let required = self.has_attr(node, "required");

        match tag {
            "select" => !(required && self.value(node).is_empty()),
            "textarea" => self.text_constraints_hold(node, &self.value(node), required),
            "input" => {
                let ty = self.input_type(node).unwrap_or_default();
                match ty.as_str() {
                    "checkbox" => !(required && !self.checked(node)),
                    "radio" => {
                        !(required && !self.radio_group(node).iter().any(|r| self.checked(*r)))
                    }
                    "submit" | "button" | "reset" | "image" | "hidden" | "file" => true,
                    _ => {
                        let value = self.value(node);
                        if !self.text_constraints_hold(node, &value, required) {
                            return false;
                        }
                        if value.is_empty() {
                            return true;
                        }
                        match ty.as_str() {
                            "email" => EMAIL.is_match(&value),
                            "url" => url::Url::parse(&value).is_ok(),
                            _ => true,
                        }
                    }
                }
            }
            _ => true,
        }
    }

    fn text_constraints_hold(&self, node: NodeId, value: &str, required: bool) -> bool {
        if value.is_empty() {
            return !required;
        }
        let len = value.chars().count();
        let limit = |name: &str| self.attr(node, name).and_then(|v| v.trim().parse::<usize>().ok());
        if limit("minlength").is_some_and(|min| len < min) {
            return false;
        }
        if limit("maxlength").is_some_and(|max| len > max) {
            return false;
        }
        if let Some(pattern) = self.attr(node, "pattern") {
            // invalid patterns are ignored, as browsers do
            if let Ok(re) = Regex::new(&format!("^(?:{})$", pattern)) {
                return re.is_match(value);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control(html: &str) -> (Dom, NodeId) {
        let dom = Dom::parse("https://example.com", &format!("<body>{}</body>", html)).unwrap();
        let body = dom.body().unwrap();
        let node = dom.element_children(body)[0];
        (dom, node)
    }

    #[test]
    fn test_required_and_lengths() {
        let (mut dom, node) = control(r#"<input required minlength="3" maxlength="5">"#);
        assert!(!dom.check_validity(node));
        dom.set_value_native(node, "ab").unwrap();
        assert!(!dom.check_validity(node));
        dom.set_value_native(node, "abcd").unwrap();
        assert!(dom.check_validity(node));
        dom.set_value_native(node, "abcdef").unwrap();
        assert!(!dom.check_validity(node));
    }

    #[test]
    fn test_typed_inputs() {
        let (mut dom, node) = control(r#"<input type="email">"#);
        assert!(dom.check_validity(node));
        dom.set_value_native(node, "not-an-email").unwrap();
        assert!(!dom.check_validity(node));
        dom.set_value_native(node, "ada@example.com").unwrap();
        assert!(dom.check_validity(node));

        let (mut dom, node) = control(r#"<input type="url">"#);
        dom.set_value_native(node, "linkedin.com/in/ada").unwrap();
        assert!(!dom.check_validity(node));
        dom.set_value_native(node, "https://linkedin.com/in/ada").unwrap();
        assert!(dom.check_validity(node));
    }

    #[test]
    fn test_pattern_and_checkbox() {
        let (mut dom, node) = control(r#"<input pattern="[0-9]{5}">"#);
        dom.set_value_native(node, "9410").unwrap();
        assert!(!dom.check_validity(node));
        dom.set_value_native(node, "94103").unwrap();
        assert!(dom.check_validity(node));

        let (mut dom, node) = control(r#"<input type="checkbox" required>"#);
        assert!(!dom.check_validity(node));
        dom.set_checked(node, true).unwrap();
        assert!(dom.check_validity(node));
    }

    #[test]
    fn test_disabled_is_valid() {
        let (dom, node) = control(r#"<input required disabled>"#);
        assert!(dom.check_validity(node));
    }
}
