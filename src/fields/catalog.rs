// src/fields/catalog.rs
use super::label::resolve_identifier;
use crate::dom::{ComposedWalk, Dom, NodeId, WalkLimits};
use crate::utils::contains_any;
use serde::Serialize;
use tracing::{debug, warn};

/// Input types that are never filled
const NON_FILLABLE_INPUTS: &[&str] = &["submit", "button", "hidden", "reset", "image"];

/// Demographic / EEO markers. Matching fields are dropped before matching.
pub const EEO_PATTERNS: &[&str] = &[
    "gender",
    "sex",
    "race",
    "ethnicity",
    "hispanic",
    "latino",
    "veteran",
    "disability",
    "disabled",
    "orientation",
    "lgbtq",
    "transgender",
    "pronouns",
    "aboriginal",
    "indigenous",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    TextArea,
    Select,
    Checkbox,
    Radio,
    File,
    ContentEditable,
    Other(String),
}

impl FieldKind {
    fn of(dom: &Dom, node: NodeId) -> Self {
        match dom.tag(node) {
            Some("textarea") => FieldKind::TextArea,
            Some("select") => FieldKind::Select,
            Some("input") => match dom.input_type(node).unwrap_or_default().as_str() {
                "text" | "email" | "tel" | "url" | "search" => FieldKind::Text,
                "checkbox" => FieldKind::Checkbox,
                "radio" => FieldKind::Radio,
                "file" => FieldKind::File,
                other => FieldKind::Other(other.to_string()),
            },
            _ => FieldKind::ContentEditable,
        }
    }
}

/// A fillable control and what the page tells us about it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    pub node: NodeId,
    pub identifier: String,
    pub kind: FieldKind,
    pub name: String,
    pub id: String,
    /// Lowercased `type` of an `<input>`
    pub input_type: Option<String>,
}

impl FieldDescriptor {
    pub fn describe(dom: &Dom, node: NodeId) -> Self {
        Self {
            node,
            identifier: resolve_identifier(dom, node),
            kind: FieldKind::of(dom, node),
            name: dom.attr_or_empty(node, "name").to_string(),
            id: dom.attr_or_empty(node, "id").to_string(),
            input_type: dom.input_type(node),
        }
    }

    pub fn is_eeo(&self) -> bool {
        [&self.identifier, &self.name, &self.id]
            .iter()
            .any(|text| contains_any(&text.to_lowercase(), EEO_PATTERNS))
    }
}

/// Whether `node` is a control the engine could ever write to
pub fn is_fillable_control(dom: &Dom, node: NodeId) -> bool {
    match dom.tag(node) {
        Some("input") => {
            let ty = dom.input_type(node).unwrap_or_default();
            !NON_FILLABLE_INPUTS.contains(&ty.as_str())
        }
        Some("textarea") | Some("select") => true,
        Some(_) => dom.is_content_editable(node),
        None => false,
    }
}

/// Fillable controls below `container` in composed-tree order, including
/// disabled, readonly and EEO controls. Frames are entered only when the
/// container is the document or its body.
pub fn controls(dom: &Dom, container: NodeId, limits: WalkLimits) -> Vec<NodeId> {
    let whole_page = dom.is_document(container) || dom.is_tag(container, "body");
    let limits = WalkLimits {
        enter_frames: limits.enter_frames && whole_page,
        ..limits
    };
    let mut walk = ComposedWalk::new(dom, container, limits);
    let found: Vec<NodeId> = walk
        .by_ref()
        .map(|(node, _)| node)
        .filter(|node| is_fillable_control(dom, *node))
        .collect();
    if walk.truncated() {
        warn!("Field scan of {} truncated after {} controls", container, found.len());
    }
    found
}

/// Descriptors of the controls in `container` that may be matched: enabled,
/// writable and not demographic.
pub fn catalog(dom: &Dom, container: NodeId, limits: WalkLimits) -> Vec<FieldDescriptor> {
    let mut fields = Vec::new();
    let mut eeo = 0;
    for node in controls(dom, container, limits) {
        if dom.is_disabled(node) || dom.is_readonly(node) {
            continue;
        }
        let field = FieldDescriptor::describe(dom, node);
        if field.is_eeo() {
            eeo += 1;
            continue;
        }
        fields.push(field);
    }
    debug!(
        "Catalogued {} fields in {} ({} EEO fields excluded)",
        fields.len(),
        container,
        eeo
    );
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<body>
        <form id="app">
            <input type="hidden" name="token">
            <label for="fn">First name</label><input id="fn" name="first">
            <input type="email" name="email">
            <input name="ro" readonly>
            <input name="off" disabled>
            <fieldset disabled><input name="inside_disabled"></fieldset>
            <label for="g">Gender</label><select id="g" name="q1"><option>-</option></select>
            <input name="veteran_status">
            <input type="radio" name="remote" value="yes">
            <input type="file" name="cv">
            <input type="date" name="start">
            <div contenteditable="true" aria-label="Cover letter"></div>
            <button type="submit">Apply</button>
            <input type="submit" value="Go">
            <div id="host"><template shadowrootmode="open"><input name="shadowed"></template></div>
        </form>
        <iframe srcdoc="<input name='framed'>"></iframe>
    </body>"#;

    fn names(dom: &Dom, fields: &[FieldDescriptor]) -> Vec<String> {
        fields
            .iter()
            .map(|f| {
                if f.name.is_empty() {
                    dom.tag(f.node).unwrap_or_default().to_string()
                } else {
                    f.name.clone()
                }
            })
            .collect()
    }

    #[test]
    fn test_catalog_filters_controls() {
        let dom = Dom::parse("https://jobs.example", PAGE).unwrap();
        let form = dom.element_by_id(dom.document(), "app").unwrap();
        let fields = catalog(&dom, form, WalkLimits::default());
        assert_eq!(
            names(&dom, &fields),
            vec!["first", "email", "remote", "cv", "start", "div", "shadowed"]
        );

        let kinds: Vec<&FieldKind> = fields.iter().map(|f| &f.kind).collect();
        assert_eq!(kinds[0], &FieldKind::Text);
        assert_eq!(kinds[2], &FieldKind::Radio);
        assert_eq!(kinds[3], &FieldKind::File);
        assert_eq!(kinds[4], &FieldKind::Other("date".to_string()));
        assert_eq!(kinds[5], &FieldKind::ContentEditable);
        assert_eq!(fields[0].identifier, "First name");
    }

    #[test]
    fn test_frames_only_from_page_level() {
        let dom = Dom::parse("https://jobs.example", PAGE).unwrap();
        let form = dom.element_by_id(dom.document(), "app").unwrap();
        let in_form = controls(&dom, form, WalkLimits::default());
        assert!(!in_form.iter().any(|n| dom.attr(*n, "name") == Some("framed")));

        let body = dom.body().unwrap();
        let in_body = catalog(&dom, body, WalkLimits::default());
        assert!(in_body.iter().any(|f| f.name == "framed"));
        let in_doc = catalog(&dom, dom.document(), WalkLimits::default());
        assert_eq!(in_doc.len(), in_body.len());
    }

    #[test]
    fn test_eeo_checks_identifier_name_and_id() {
        let dom = Dom::parse(
            "https://jobs.example",
            r#"<input id="race_q"><input name="pronouns"><input aria-label="Are you Hispanic or Latino?"><input name="city">"#,
        )
        .unwrap();
        let fields = catalog(&dom, dom.document(), WalkLimits::default());
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name, "city");
    }
}
