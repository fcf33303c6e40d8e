//! Tolerant Prometheus text exposition parser.
//!
//! Only lines whose name starts with one of the configured prefixes are
//! considered. Anything that does not look like `name{labels} value` is
//! skipped; a scrape never fails because of its content.

use std::collections::HashMap;

use tracing::trace;

use crate::types::Sample;

/// Parse an exposition payload into samples.
///
/// Each line is handled independently. Blank lines, `#` metadata lines,
/// lines not starting with a recognized prefix, and lines whose trailing
/// token is not a finite number produce nothing.
pub fn parse<P: AsRef<str>>(text: &str, prefixes: &[P]) -> Vec<Sample> {
    text.lines()
        .filter_map(|line| parse_line(line, prefixes))
        .collect()
}

fn parse_line<P: AsRef<str>>(line: &str, prefixes: &[P]) -> Option<Sample> {
    let line = line.trim_start();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    if !prefixes.iter().any(|p| line.starts_with(p.as_ref())) {
        return None;
    }

    let name_end = line
        .find(|c: char| c == '{' || c.is_whitespace())
        .unwrap_or(line.len());
    let name = &line[..name_end];
    let mut rest = &line[name_end..];

    let labels = if let Some(block) = rest.strip_prefix('{') {
        let Some(close) = block.find('}') else {
            trace!(%line, "unterminated label block");
            return None;
        };
        rest = &block[close + 1..];
        parse_labels(&block[..close])
    } else {
        HashMap::new()
    };

    let token = rest.split_whitespace().last()?;
    let value = match token.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => {
            trace!(%line, %token, "skipping line with non-numeric value");
            return None;
        }
    };

    Some(Sample {
        name: name.to_string(),
        labels,
        value,
    })
}

/// Parse the inside of a `{k="v",...}` block. Pairs without `=` are dropped.
fn parse_labels(block: &str) -> HashMap<String, String> {
    block
        .split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}
