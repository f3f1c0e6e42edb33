// src/fill/executor.rs
//! Writes matched profile values into a detected form, dispatching the
//! events page frameworks listen for.

use super::result::{FailedField, FieldRef, FillResult, FilledField, SkippedField};
use crate::config::{EngineConfig, Timing};
use crate::dom::{Dom, EventKind, NodeId, Page};
use crate::fields::{catalog, FieldDescriptor, FieldKind};
use crate::matching::{FieldMatch, ProfileMatcher};
use crate::profile::Profile;
use crate::utils::is_truthy;
use anyhow::{Context, Result};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

const NO_PROFILE_DATA: &str = "No matching profile data";

/// Inline style applied to file inputs the user still has to fill
const UPLOAD_HIGHLIGHT: &str = "border: 2px solid #667eea; box-shadow: 0 0 0 3px rgba(102, 126, 234, 0.2)";

#[derive(Debug, Clone)]
pub struct FillOptions {
    /// Type character by character and pause between fields
    pub human_like: bool,
    pub validate_after: bool,
    pub scroll_into_view: bool,
    pub focus: bool,
    /// Seed for the pacing RNG; random when unset
    pub pacing_seed: Option<u64>,
}

impl Default for FillOptions {
    fn default() -> Self {
        Self {
            human_like: true,
            validate_after: true,
            scroll_into_view: true,
            focus: true,
            pacing_seed: None,
        }
    }
}

impl FillOptions {
    pub fn with_human_like(mut self, human_like: bool) -> Self {
        self.human_like = human_like;
        self
    }

    pub fn with_validation(mut self, validate_after: bool) -> Self {
        self.validate_after = validate_after;
        self
    }

    pub fn with_scrolling(mut self, scroll_into_view: bool) -> Self {
        self.scroll_into_view = scroll_into_view;
        self
    }

    pub fn with_focus(mut self, focus: bool) -> Self {
        self.focus = focus;
        self
    }

    pub fn with_pacing_seed(mut self, seed: u64) -> Self {
        self.pacing_seed = Some(seed);
        self
    }
}

/// What a fill wrote, for the read-back check
#[derive(Debug, Clone)]
enum Written {
    Value { node: NodeId, value: String },
    Checked { node: NodeId, checked: bool },
    Text { node: NodeId, text: String },
}

impl Written {
    fn node(&self) -> NodeId {
        match self {
            Written::Value { node, .. } | Written::Checked { node, .. } | Written::Text { node, .. } => *node,
        }
    }

    fn reads_back(&self, dom: &Dom) -> bool {
        match self {
            Written::Value { node, value } => dom.value(*node) == *value,
            Written::Checked { node, checked } => dom.checked(*node) == *checked,
            Written::Text { node, text } => dom.text_content(*node) == *text,
        }
    }
}

pub struct FillExecutor<'a> {
    config: &'a EngineConfig,
    options: FillOptions,
    rng: SmallRng,
}

impl<'a> FillExecutor<'a> {
    pub fn new(config: &'a EngineConfig, options: FillOptions) -> Self {
        let rng = match options.pacing_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };
        Self {
            config,
            options,
            rng,
        }
    }

    fn timing(&self) -> &Timing {
        &self.config.timing
    }

    /// Catalog, match and fill every field of `container`
    pub async fn fill(&mut self, page: &mut Page, container: NodeId, profile: &Profile) -> FillResult {
        let mut result = FillResult::new();
        info!("Starting autofill of {} with {} profile attributes", container, profile.len());

        let limits = self.config.walk_limits(true);
        let fields = catalog(page.dom(), container, limits);
        let mapping = ProfileMatcher::new(profile, &self.config.thresholds).map_fields(fields);
        result.total_fields = mapping.matched.len() + mapping.unmatched.len();
        info!(
            "Mapped {} fields, {} unmapped",
            mapping.matched.len(),
            mapping.unmatched.len()
        );

        let ordered = visual_order(page.dom(), mapping.matched, self.config.row_tolerance_px);
        let mut written: Vec<Written> = Vec::new();
        // radio groups already handled, keyed by their first member
        let mut radio_groups: HashSet<NodeId> = HashSet::new();

        for (field, found) in ordered {
            if field.kind == FieldKind::File {
                debug!("File upload field: {}", field.identifier);
                result.file_uploads.push(FieldRef::from(&field));
                continue;
            }
            if !page.dom().is_connected(field.node) {
                debug!("Field {} detached before fill, skipping", field.identifier);
                continue;
            }
            if field.kind == FieldKind::Radio {
                let group = page.dom().radio_group(field.node);
                let leader = group.first().copied().unwrap_or(field.node);
                if !radio_groups.insert(leader) {
                    debug!("Radio group of {} already filled", field.identifier);
                    continue;
                }
            }

            if self.options.scroll_into_view {
                page.scroll_into_view(field.node);
                self.pause(self.timing().scroll_pause_ms).await;
            }
            if self.options.focus {
                page.focus(field.node);
                self.pause(self.timing().focus_pause_ms).await;
            }

            let outcome = self.fill_field(page, &field, &found.value).await;
            match outcome {
                Ok(write) => {
                    debug!("Filled {} = {:?}", field.identifier, found.value);
                    // a radio group reports the option that was checked
                    let target = if write.node() == field.node {
                        field
                    } else {
                        FieldDescriptor::describe(page.dom(), write.node())
                    };
                    written.push(write);
                    result.filled.push(filled(&target, found));
                }
                Err(e) => {
                    warn!("Failed to fill {}: {}", field.identifier, e);
                    result.failed.push(FailedField {
                        field: FieldRef::from(&field),
                        key: found.profile_key,
                        reason: e.to_string(),
                    });
                }
            }

            if self.options.human_like {
                let (min, max) = (self.timing().field_delay_min_ms, self.timing().field_delay_max_ms);
                let delay = self.rng.random_range(min..=max);
                self.pause(delay).await;
            }
        }

        if self.options.validate_after {
            let dom = page.dom();
            for (item, write) in result.filled.iter_mut().zip(&written) {
                let validated = write.reads_back(dom);
                let valid = dom.check_validity(write.node());
                if !validated {
                    warn!("Validation failed for {}: value did not stick", item.field.identifier);
                }
                if !valid {
                    warn!("Constraint validation failed for {}", item.field.identifier);
                }
                item.validated = Some(validated);
                item.valid = Some(valid);
            }
        }

        result.skipped = mapping
            .unmatched
            .iter()
            .map(|field| SkippedField {
                field: FieldRef::from(field),
                reason: NO_PROFILE_DATA.to_string(),
            })
            .collect();

        result.finish();
        info!(
            "Autofill complete: {} filled, {} failed, {} skipped, {} uploads in {}ms",
            result.filled.len(),
            result.failed.len(),
            result.skipped.len(),
            result.file_uploads.len(),
            result.duration_ms
        );
        result
    }

    async fn fill_field(&mut self, page: &mut Page, field: &FieldDescriptor, value: &str) -> Result<Written> {
        match &field.kind {
            FieldKind::Text | FieldKind::TextArea => self.fill_text(page, field.node, value).await,
            FieldKind::ContentEditable => self.fill_content_editable(page, field.node, value).await,
            FieldKind::Select => fill_select(page, field.node, value),
            FieldKind::Checkbox => fill_checkbox(page, field.node, value),
            FieldKind::Radio => fill_radio(page, field.node, value),
            FieldKind::File => anyhow::bail!("file inputs cannot be filled"),
            FieldKind::Other(ty) => anyhow::bail!("unsupported field type: {}", ty),
        }
    }

    async fn fill_text(&mut self, page: &mut Page, node: NodeId, value: &str) -> Result<Written> {
        page.dom_mut().set_value_native(node, "")?;
        page.dispatch(node, EventKind::Focus);

        if self.options.human_like {
            let mut typed = String::with_capacity(value.len());
            for c in value.chars() {
                typed.push(c);
                page.dom_mut().set_value_native(node, &typed)?;
                page.dispatch(node, EventKind::Input);
                self.typing_pause().await;
            }
        } else {
            page.dom_mut().set_value_native(node, value)?;
            page.dispatch(node, EventKind::Input);
        }

        page.dispatch(node, EventKind::Change);
        page.blur(node);
        Ok(Written::Value {
            node,
            value: value.to_string(),
        })
    }

    async fn fill_content_editable(&mut self, page: &mut Page, node: NodeId, value: &str) -> Result<Written> {
        page.dom_mut().set_text_content(node, "")?;
        page.dispatch(node, EventKind::Focus);

        if self.options.human_like {
            let mut typed = String::with_capacity(value.len());
            for c in value.chars() {
                typed.push(c);
                page.dom_mut().set_text_content(node, &typed)?;
                page.dispatch(node, EventKind::Input);
                self.typing_pause().await;
            }
        } else {
            page.dom_mut().set_text_content(node, value)?;
            page.dispatch(node, EventKind::Input);
        }

        page.dispatch(node, EventKind::Change);
        page.blur(node);
        Ok(Written::Text {
            node,
            text: value.to_string(),
        })
    }

    async fn typing_pause(&mut self) {
        let (min, max) = (self.timing().typing_delay_min_ms, self.timing().typing_delay_max_ms);
        let delay = self.rng.random_range(min..=max);
        self.pause(delay).await;
    }

    async fn pause(&self, ms: u64) {
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    /// Scroll each upload field into view and outline it for the user
    pub async fn highlight_file_uploads(&mut self, page: &mut Page, uploads: &[FieldRef]) -> Result<()> {
        for upload in uploads {
            if !page.dom().is_connected(upload.node) {
                continue;
            }
            page.scroll_into_view(upload.node);
            let style = match page.dom().attr(upload.node, "style").map(str::trim) {
                Some(existing) if !existing.is_empty() => {
                    format!("{}; {}", existing.trim_end_matches(';'), UPLOAD_HIGHLIGHT)
                }
                _ => UPLOAD_HIGHLIGHT.to_string(),
            };
            page.dom_mut()
                .set_attr(upload.node, "style", &style)
                .with_context(|| format!("Failed to highlight {}", upload.identifier))?;
        }
        if !uploads.is_empty() {
            info!("Please attach your resume to {} file field(s)", uploads.len());
        }
        Ok(())
    }
}

fn filled(field: &FieldDescriptor, found: FieldMatch) -> FilledField {
    FilledField {
        field: FieldRef::from(field),
        key: found.profile_key,
        value: found.value,
        confidence: found.confidence,
        validated: None,
        valid: None,
    }
}

fn fill_select(page: &mut Page, select: NodeId, value: &str) -> Result<Written> {
    let dom = page.dom();
    let options = dom.options(select);
    let wanted = value.to_lowercase();

    let option = options
        .iter()
        .copied()
        .find(|opt| dom.option_value(*opt) == value)
        .or_else(|| {
            options
                .iter()
                .copied()
                .find(|opt| dom.option_text(*opt).to_lowercase() == wanted)
        })
        .or_else(|| {
            options.iter().copied().find(|opt| {
                let text = dom.option_text(*opt).to_lowercase();
                !text.is_empty() && (text.contains(&wanted) || wanted.contains(&text))
            })
        })
        .with_context(|| format!("no option matching {:?}", value))?;

    let chosen = dom.option_value(option);
    page.dom_mut().select_option(select, option)?;
    page.dispatch(select, EventKind::Change);
    page.blur(select);
    Ok(Written::Value {
        node: select,
        value: chosen,
    })
}

fn fill_checkbox(page: &mut Page, checkbox: NodeId, value: &str) -> Result<Written> {
    let should_check = is_truthy(value);
    if page.dom().checked(checkbox) != should_check {
        page.dom_mut().set_checked(checkbox, should_check)?;
        page.dispatch(checkbox, EventKind::Change);
        page.click(checkbox);
    }
    Ok(Written::Checked {
        node: checkbox,
        checked: should_check,
    })
}

fn fill_radio(page: &mut Page, radio: NodeId, value: &str) -> Result<Written> {
    let dom = page.dom();
    let target = dom
        .radio_group(radio)
        .into_iter()
        .find(|r| dom.attr(*r, "value") == Some(value) || dom.attr(*r, "id") == Some(value))
        .with_context(|| format!("no radio option matching {:?}", value))?;

    page.dom_mut().set_checked(target, true)?;
    page.dispatch(target, EventKind::Change);
    page.click(target);
    Ok(Written::Checked {
        node: target,
        checked: true,
    })
}

/// Sort matched fields top to bottom; fields whose tops lie within
/// `tolerance` pixels of a row's first field form one row, read left to right.
pub fn visual_order<T>(dom: &Dom, items: Vec<(FieldDescriptor, T)>, tolerance: f64) -> Vec<(FieldDescriptor, T)> {
    let mut placed: Vec<(f64, f64, usize, (FieldDescriptor, T))> = items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let rect = dom.rect(item.0.node);
            (rect.top, rect.left, i, item)
        })
        .collect();
    placed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.2.cmp(&b.2)));

    let mut rows: Vec<Vec<(f64, usize, (FieldDescriptor, T))>> = Vec::new();
    let mut row_top = f64::NEG_INFINITY;
    for (top, left, i, item) in placed {
        if rows.is_empty() || top - row_top > tolerance {
            row_top = top;
            rows.push(Vec::new());
        }
        if let Some(row) = rows.last_mut() {
            row.push((left, i, item));
        }
    }

    rows.into_iter()
        .flat_map(|mut row| {
            row.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            row.into_iter().map(|(_, _, item)| item)
        })
        .collect()
}
