//! YAML frontmatter extraction for documentation pages.
//!
//! Registry documentation carries an optional frontmatter block between
//! `---` fences at the top of the file. The blocks found in the wild are
//! frequently malformed, so parsing degrades through two stages and never
//! fails: a proper YAML parse first, then a line-oriented key/value scan.

use serde_yaml::Value;

/// Metadata recovered from the top of a documentation page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    pub page_title: Option<String>,
    pub subcategory: Option<String>,
    pub description: Option<String>,
}

const FENCE: &str = "---";

/// Extracts frontmatter from `contents`. Returns empty metadata when no
/// fenced block is present or nothing usable can be recovered from it.
pub fn parse(contents: &str) -> Frontmatter {
    let Some(block) = fenced_block(contents) else {
        return Frontmatter::default();
    };
    match serde_yaml::from_str::<Value>(block) {
        Ok(Value::Mapping(mapping)) => {
            let field = |key: &str| {
                mapping
                    .get(Value::String(key.to_string()))
                    .and_then(scalar_to_string)
            };
            Frontmatter {
                page_title: field("page_title"),
                subcategory: field("subcategory"),
                description: field("description"),
            }
        }
        _ => scan_lines(block),
    }
}

/// Returns the text between the opening and closing fences, if the file
/// starts with one.
fn fenced_block(contents: &str) -> Option<&str> {
    let rest = contents.strip_prefix(FENCE)?;
    let rest = rest.strip_prefix('\r').unwrap_or(rest);
    let rest = rest.strip_prefix('\n')?;
    for (offset, line) in line_spans(rest) {
        if line.trim_end_matches('\r') == FENCE {
            return Some(&rest[..offset]);
        }
    }
    None
}

fn line_spans(text: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0;
    text.split_inclusive('\n').map(move |line| {
        let start = offset;
        offset += line.len();
        (start, line.trim_end_matches('\n'))
    })
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Fallback for YAML the parser rejects: pick out the known keys from
/// `key: value` lines, trimming one layer of matching quotes.
fn scan_lines(block: &str) -> Frontmatter {
    let mut result = Frontmatter::default();
    for line in block.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = trim_quotes(value.trim());
        if value.is_empty() {
            continue;
        }
        match key.trim() {
            "page_title" => result.page_title = Some(value.to_string()),
            "subcategory" => result.subcategory = Some(value.to_string()),
            "description" => result.description = Some(value.to_string()),
            _ => {}
        }
    }
    result
}

fn trim_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}
