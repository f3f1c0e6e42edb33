// src/dom/selector.rs
//! A small CSS selector engine: type and universal selectors, `#id`,
//! `.class`, attribute tests (`[a]`, `=`, `*=`, `^=`, `$=`, `~=`), selector
//! lists and the descendant combinator.

use super::{Dom, NodeId};
use anyhow::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    source: String,
    alternatives: Vec<Vec<Compound>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attrs: Vec<AttrTest>,
}

#[derive(Debug, Clone, PartialEq)]
struct AttrTest {
    name: String,
    op: AttrOp,
    value: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum AttrOp {
    Exists,
    Equals,
    Contains,
    Prefix,
    Suffix,
    Word,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self> {
        let mut alternatives = Vec::new();
        for part in split_top_level(input, |c| c == ',') {
            let part = part.trim();
            if part.is_empty() {
                anyhow::bail!("empty selector in {:?}", input);
            }
            let mut compounds = Vec::new();
            for token in split_top_level(part, char::is_whitespace) {
                let token = token.trim();
                if token.is_empty() {
                    continue;
                }
                if matches!(token, ">" | "+" | "~") {
                    anyhow::bail!("unsupported combinator {:?} in {:?}", token, input);
                }
                compounds.push(parse_compound(token)?);
            }
            alternatives.push(compounds);
        }
        Ok(Self {
            source: input.trim().to_string(),
            alternatives,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, dom: &Dom, node: NodeId) -> bool {
        self.alternatives
            .iter()
            .any(|compounds| matches_chain(dom, node, compounds))
    }
}

fn matches_chain(dom: &Dom, node: NodeId, compounds: &[Compound]) -> bool {
    let Some((last, rest)) = compounds.split_last() else {
        return false;
    };
    if !last.matches(dom, node) {
        return false;
    }
    // greedy: each earlier compound must match some ancestor, nearest first
    let mut remaining = rest;
    let mut ancestors = dom.ancestors(node).into_iter();
    while let Some((wanted, before)) = remaining.split_last() {
        match ancestors.by_ref().find(|a| wanted.matches(dom, *a)) {
            Some(_) => remaining = before,
            None => return false,
        }
    }
    true
}

impl Compound {
    fn matches(&self, dom: &Dom, node: NodeId) -> bool {
        let Some(tag) = dom.tag(node) else {
            return false;
        };
        if let Some(wanted) = &self.tag {
            if wanted != "*" && !wanted.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if self.ids.iter().any(|id| dom.attr(node, "id") != Some(id.as_str())) {
            return false;
        }
        let classes = dom.attr_or_empty(node, "class");
        if self
            .classes
            .iter()
            .any(|c| !classes.split_whitespace().any(|have| have == c))
        {
            return false;
        }
        self.attrs.iter().all(|test| test.matches(dom.attr(node, &test.name)))
    }
}

impl AttrTest {
    fn matches(&self, actual: Option<&str>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        match self.op {
            AttrOp::Exists => true,
            AttrOp::Equals => actual == self.value,
            AttrOp::Contains => !self.value.is_empty() && actual.contains(&self.value),
            AttrOp::Prefix => !self.value.is_empty() && actual.starts_with(&self.value),
            AttrOp::Suffix => !self.value.is_empty() && actual.ends_with(&self.value),
            AttrOp::Word => actual.split_whitespace().any(|w| w == self.value),
        }
    }
}

/// Split on separator characters outside brackets, parentheses and quotes.
fn split_top_level(input: &str, is_sep: impl Fn(char) -> bool) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                continue;
            }
            '"' | '\'' if quote == Some(c) => quote = None,
            '"' | '\'' if quote.is_none() => quote = Some(c),
            '[' | '(' if quote.is_none() => depth += 1,
            ']' | ')' if quote.is_none() => depth = depth.saturating_sub(1),
            _ if is_sep(c) && depth == 0 && quote.is_none() => {
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    parts.push(current);
    parts
}

fn parse_compound(token: &str) -> Result<Compound> {
    let chars: Vec<char> = token.chars().collect();
    let mut pos = 0;
    let mut compound = Compound::default();

    if pos < chars.len() && (chars[pos] == '*' || is_ident_char(chars[pos])) {
        if chars[pos] == '*' {
            pos += 1;
            compound.tag = Some("*".to_string());
        } else {
            compound.tag = Some(read_ident(&chars, &mut pos).to_ascii_lowercase());
        }
    }

    while pos < chars.len() {
        match chars[pos] {
            '#' => {
                pos += 1;
                let ident = read_ident(&chars, &mut pos);
                if ident.is_empty() {
                    anyhow::bail!("expected id after '#' in {:?}", token);
                }
                compound.ids.push(ident);
            }
            '.' => {
                pos += 1;
                let ident = read_ident(&chars, &mut pos);
                if ident.is_empty() {
                    anyhow::bail!("expected class after '.' in {:?}", token);
                }
                compound.classes.push(ident);
            }
            '[' => {
                pos += 1;
                compound.attrs.push(parse_attr(&chars, &mut pos, token)?);
            }
            other => anyhow::bail!("unexpected {:?} in selector {:?}", other, token),
        }
    }
    Ok(compound)
}

fn parse_attr(chars: &[char], pos: &mut usize, token: &str) -> Result<AttrTest> {
    skip_spaces(chars, pos);
    let name = read_ident(chars, pos).to_ascii_lowercase();
    if name.is_empty() {
        anyhow::bail!("expected attribute name in {:?}", token);
    }
    skip_spaces(chars, pos);

    let op = match chars.get(*pos) {
        Some(']') => {
            *pos += 1;
            return Ok(AttrTest {
                name,
                op: AttrOp::Exists,
                value: String::new(),
            });
        }
        Some('=') => {
            *pos += 1;
            AttrOp::Equals
        }
        Some(c @ ('*' | '^' | '$' | '~')) if chars.get(*pos + 1) == Some(&'=') => {
            let op = match c {
                '*' => AttrOp::Contains,
                '^' => AttrOp::Prefix,
                '$' => AttrOp::Suffix,
                _ => AttrOp::Word,
            };
            *pos += 2;
            op
        }
        _ => anyhow::bail!("bad attribute operator in {:?}", token),
    };

    skip_spaces(chars, pos);
    let value = match chars.get(*pos) {
        Some(q @ ('"' | '\'')) => {
            let q = *q;
            *pos += 1;
            let mut value = String::new();
            while *pos < chars.len() && chars[*pos] != q {
                if chars[*pos] == '\\' && *pos + 1 < chars.len() {
                    *pos += 1;
                }
                value.push(chars[*pos]);
                *pos += 1;
            }
            if *pos >= chars.len() {
                anyhow::bail!("unterminated string in {:?}", token);
            }
            *pos += 1;
            value
        }
        _ => read_ident(chars, pos),
    };
    skip_spaces(chars, pos);
    // case-sensitivity flags are accepted and ignored
    if matches!(chars.get(*pos), Some('i') | Some('s')) {
        *pos += 1;
        skip_spaces(chars, pos);
    }
    if chars.get(*pos) != Some(&']') {
        anyhow::bail!("expected ']' in {:?}", token);
    }
    *pos += 1;
    Ok(AttrTest { name, op, value })
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_' || c == '\\' || !c.is_ascii()
}

fn read_ident(chars: &[char], pos: &mut usize) -> String {
    let mut out = String::new();
    while *pos < chars.len() && is_ident_char(chars[*pos]) {
        if chars[*pos] == '\\' {
            *pos += 1;
            if *pos < chars.len() {
                out.push(chars[*pos]);
                *pos += 1;
            }
            continue;
        }
        out.push(chars[*pos]);
        *pos += 1;
    }
    out
}

fn skip_spaces(chars: &[char], pos: &mut usize) {
    while *pos < chars.len() && chars[*pos].is_whitespace() {
        *pos += 1;
    }
}
