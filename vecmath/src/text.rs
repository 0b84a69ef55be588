//! Textual vector format: `[0.1,0.2,...]`.
//!
//! This is the pgvector literal layout. Postgres array literals (`{...}`)
//! are accepted on input as well.

use std::fmt::Write;

use crate::error::VecError;

/// Parse a textual vector literal.
///
/// Whitespace around components is ignored. `[]` parses to an empty vector.
pub fn parse_vector(text: &str) -> Result<Vec<f32>, VecError> {
    let s = text.trim();
    let inner = if let Some(rest) = s.strip_prefix('[') {
        rest.strip_suffix(']')
    } else if let Some(rest) = s.strip_prefix('{') {
        rest.strip_suffix('}')
    } else {
        None
    };
    let inner = inner.ok_or_else(|| VecError::InvalidFormat(truncate(s)))?;

    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut out = Vec::with_capacity(inner.len() / 8 + 1);
    for (i, part) in inner.split(',').enumerate() {
        let v: f32 = part
            .trim()
            .parse()
            .map_err(|_| VecError::InvalidFormat(format!("component {i}: {:?}", part.trim())))?;
        if !v.is_finite() {
            return Err(VecError::NonFinite(i));
        }
        out.push(v);
    }
    Ok(out)
}

/// Format a vector as `[v1,v2,...]` with `precision` fractional digits.
pub fn format_vector(v: &[f32], precision: usize) -> String {
    let mut out = String::with_capacity(v.len() * (precision + 4) + 2);
    out.push('[');
    for (i, x) in v.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{x:.precision$}");
    }
    out.push(']');
    out
}

fn truncate(s: &str) -> String {
    const MAX: usize = 32;
    match s.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
