// src/utils.rs

/// Collapse runs of whitespace into single spaces and trim the ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Clean label text: drop `*` and `:` markers, collapse whitespace
pub fn clean_label_text(text: &str) -> String {
    let stripped: String = text.chars().filter(|c| *c != '*' && *c != ':').collect();
    collapse_whitespace(&stripped)
}

/// Normalize a button or link caption for comparison: lowercase, collapsed
/// whitespace, surrounding arrows and punctuation removed
pub fn normalize_caption(text: &str) -> String {
    collapse_whitespace(&text.to_lowercase())
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_string()
}

/// Normalize a profile attribute name to snake_case (`firstName` -> `first_name`)
pub fn canonical_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev_lower = false;
    for c in key.trim().chars() {
        if c.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower = false;
        } else if c == '-' || c == ' ' || c == '.' {
            if !out.ends_with('_') {
                out.push('_');
            }
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
        }
    }
    out.trim_matches('_').to_string()
}

/// True when `haystack` contains any of the keywords
pub fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| haystack.contains(k))
}

/// Host of a URL without a leading `www.`
pub fn display_host(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// Interpret a profile value as a checkbox state
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes"
    )
}
