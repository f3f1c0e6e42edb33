// src/dom/parse.rs
//! HTML → arena conversion on top of `scraper`'s html5ever tree.

use super::{Dom, Frame, NodeId, ShadowMode};
use anyhow::Result;
use scraper::{Html, Node as HtmlNode};
use tracing::debug;
use url::Url;

pub(super) fn load_document(dom: &mut Dom, document: NodeId, html: &str, base: Option<&Url>) -> Result<()> {
    let parsed = Html::parse_document(html);
    graft(dom, document, &parsed, false, base)
}

pub(super) fn load_fragment(dom: &mut Dom, parent: NodeId, html: &str) -> Result<()> {
    let parsed = Html::parse_fragment(html);
    graft(dom, parent, &parsed, true, None)
}

/// Copy a parsed tree under `parent`, in document order. Declarative shadow
/// templates become shadow roots and iframes get their frame state.
fn graft(dom: &mut Dom, parent: NodeId, parsed: &Html, fragment: bool, base: Option<&Url>) -> Result<()> {
    let mut stack = Vec::new();
    for child in parsed.tree.root().children().rev() {
        match child.value() {
            // fragments come wrapped in a synthetic <html> element
            HtmlNode::Element(el) if fragment && el.name() == "html" => {
                for inner in child.children().rev() {
                    stack.push((inner, parent));
                }
            }
            _ => stack.push((child, parent)),
        }
    }

    let mut textareas = Vec::new();

    while let Some((node, parent)) = stack.pop() {
        match node.value() {
            HtmlNode::Text(text) => {
                let content: &str = text;
                dom.create_text(parent, content);
            }
            HtmlNode::Element(el) => {
                let tag = el.name().to_ascii_lowercase();
                let attrs: Vec<(String, String)> = el
                    .attrs()
                    .map(|(name, value)| (name.to_ascii_lowercase(), value.to_string()))
                    .collect();

                if tag == "template" {
                    if let Some(mode) = shadow_mode(&attrs) {
                        if dom.is_element(parent) && dom.element(parent).and_then(|e| e.shadow_root).is_none() {
                            let root = dom.create_shadow_root(parent, mode)?;
                            for child in node.children().rev() {
                                stack.push((child, root));
                            }
                            continue;
                        }
                    }
                }

                let id = dom.create_element(parent, &tag, attrs);
                match tag.as_str() {
                    "iframe" => load_frame(dom, id, base)?,
                    "textarea" => textareas.push(id),
                    // inert template content is not part of the rendered page
                    "template" => continue,
                    _ => {}
                }
                for child in node.children().rev() {
                    stack.push((child, id));
                }
            }
            // template contents are held in a document fragment
            HtmlNode::Fragment => {
                for child in node.children().rev() {
                    stack.push((child, parent));
                }
            }
            _ => {}
        }
    }

    for textarea in textareas {
        let text = dom.text_content(textarea);
        if let Some(element) = dom.element_mut(textarea) {
            element.value = text;
        }
    }
    Ok(())
}

fn shadow_mode(attrs: &[(String, String)]) -> Option<ShadowMode> {
    let mode = attrs
        .iter()
        .find(|(name, _)| name == "shadowrootmode" || name == "shadowroot")
        .map(|(_, value)| value.to_ascii_lowercase())?;
    match mode.as_str() {
        "open" => Some(ShadowMode::Open),
        "closed" => Some(ShadowMode::Closed),
        _ => None,
    }
}

/// `srcdoc` frames share the embedding origin and are parsed right away.
/// `src` frames are compared by origin; their documents are never fetched.
fn load_frame(dom: &mut Dom, iframe: NodeId, base: Option<&Url>) -> Result<()> {
    let page_origin = dom.origin_of(iframe).to_string();

    if let Some(srcdoc) = dom.attr(iframe, "srcdoc").map(str::to_string) {
        let doc = dom.create_document(page_origin, Some(iframe));
        load_document(dom, doc, &srcdoc, base)?;
        if let Some(element) = dom.element_mut(iframe) {
            element.frame = Some(Frame::Loaded(doc));
        }
        return Ok(());
    }

    let src = dom.attr_or_empty(iframe, "src").trim().to_string();
    let frame = if src.is_empty() || src.starts_with("about:") {
        let doc = dom.create_document(page_origin, Some(iframe));
        load_document(dom, doc, "", base)?;
        Frame::Loaded(doc)
    } else {
        let resolved = match base {
            Some(base) => base.join(&src).ok(),
            None => Url::parse(&src).ok(),
        };
        match resolved.map(|u| u.origin().ascii_serialization()) {
            Some(origin) if origin == page_origin && origin != "null" => Frame::Unloaded,
            Some(origin) => Frame::CrossOrigin { origin },
            None => Frame::CrossOrigin {
                origin: "null".to_string(),
            },
        }
    };
    debug!("iframe {} src={} -> {:?}", iframe, src, frame);
    if let Some(element) = dom.element_mut(iframe) {
        element.frame = Some(frame);
    }
    Ok(())
}
