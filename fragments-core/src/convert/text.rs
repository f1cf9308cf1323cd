//! Syntactic text conversions. All are pure and deterministic.

use crate::{FragmentError, Result};
use pulldown_cmark::{html, Event, Options, Parser, Tag, TagEnd};
use serde_json::{Map, Value};

fn as_str(data: &[u8]) -> Result<&str> {
    std::str::from_utf8(data)
        .map_err(|e| FragmentError::conversion_failed(format!("source is not valid UTF-8: {e}")))
}

fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

pub(super) fn utf8_text(data: &[u8]) -> Result<Vec<u8>> {
    as_str(data).map(|text| text.as_bytes().to_vec())
}

pub(super) fn markdown_to_html(data: &[u8]) -> Result<Vec<u8>> {
    let markdown = as_str(data)?;
    let mut html_output = String::new();
    html::push_html(&mut html_output, Parser::new_ext(markdown, markdown_options()));
    Ok(html_output.into_bytes())
}

/// Text content of a Markdown document, one block per line
pub(super) fn markdown_to_plain(data: &[u8]) -> Result<Vec<u8>> {
    let markdown = as_str(data)?;
    let mut out = String::new();

    for event in Parser::new_ext(markdown, markdown_options()) {
        match event {
            Event::Text(text) | Event::Code(text) => out.push_str(&text),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::Start(Tag::Item) => out.push_str("- "),
            Event::End(
                TagEnd::Paragraph
                | TagEnd::Heading(_)
                | TagEnd::Item
                | TagEnd::CodeBlock
                | TagEnd::TableRow
                | TagEnd::TableHead,
            ) => {
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Event::End(TagEnd::TableCell) => out.push('\t'),
            _ => {}
        }
    }

    Ok(out.trim_end().as_bytes().to_vec())
}

const BLOCK_TAGS: &[&str] = &[
    "p", "br", "div", "li", "tr", "h1", "h2", "h3", "h4", "h5", "h6", "pre", "blockquote",
    "section", "article", "header", "footer", "table", "ul", "ol",
];

/// Strip tags and decode the common character entities
pub(super) fn html_to_plain(data: &[u8]) -> Result<Vec<u8>> {
    let html = as_str(data)?;
    let mut stripped = String::with_capacity(html.len());
    let mut rest = html;
    let mut skip_until: Option<&str> = None;

    while let Some(open) = rest.find('<') {
        if skip_until.is_none() {
            stripped.push_str(&rest[..open]);
        }
        // A tag opens only with a name, a closing slash or a declaration.
        let starts_tag = rest[open + 1..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '/' || c == '!');
        if !starts_tag {
            if skip_until.is_none() {
                stripped.push('<');
            }
            rest = &rest[open + 1..];
            continue;
        }
        let Some(close) = rest[open..].find('>') else {
            // Unterminated tag: keep the remainder as text.
            if skip_until.is_none() {
                stripped.push_str(&rest[open..]);
            }
            rest = "";
            break;
        };

        let tag = &rest[open + 1..open + close];
        let name = tag
            .trim_start_matches('/')
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        let closing = tag.starts_with('/');

        match skip_until {
            Some(until) if closing && name == until => skip_until = None,
            Some(_) => {}
            None if !closing && (name == "script" || name == "style") => {
                skip_until = Some(if name == "script" { "script" } else { "style" });
            }
            None if BLOCK_TAGS.contains(&name.as_str()) => stripped.push('\n'),
            None => {}
        }

        rest = &rest[open + close + 1..];
    }
    if skip_until.is_none() {
        stripped.push_str(rest);
    }

    let decoded = decode_entities(&stripped);
    let text = decoded
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    Ok(text.into_bytes())
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Comma-separated rows to a JSON array of objects keyed by the header row
///
/// Values stay strings. Missing trailing cells become `""`, surplus cells
/// are dropped and blank lines are skipped.
pub(super) fn csv_to_json(data: &[u8]) -> Result<Vec<u8>> {
    let csv = as_str(data)?;
    let mut lines = csv
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty());

    let Some(header) = lines.next() else {
        return Ok(b"[]".to_vec());
    };
    let keys: Vec<&str> = header.split(',').map(str::trim).collect();

    let rows: Vec<Value> = lines
        .map(|line| {
            let mut cells = line.split(',').map(str::trim);
            let row: Map<String, Value> = keys
                .iter()
                .map(|key| {
                    let cell = cells.next().unwrap_or("");
                    (key.to_string(), Value::String(cell.to_string()))
                })
                .collect();
            Value::Object(row)
        })
        .collect();

    serde_json::to_vec(&rows)
        .map_err(|e| FragmentError::conversion_failed(format!("failed to encode JSON: {e}")))
}

pub(super) fn json_to_yaml(data: &[u8]) -> Result<Vec<u8>> {
    let value: Value = serde_json::from_slice(data)
        .map_err(|e| FragmentError::conversion_failed(format!("source is not valid JSON: {e}")))?;
    serde_yaml_ng::to_string(&value)
        .map(String::into_bytes)
        .map_err(|e| FragmentError::conversion_failed(format!("failed to encode YAML: {e}")))
}
