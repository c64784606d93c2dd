//! Minimal helpers for the flat protobuf text format shared by family
//! descriptors and the language reference data.

use anyhow::{Context, Result};
use regex::Regex;

/// Matches `key: "value"` at line start and captures the value.
pub(crate) fn scalar_re(key: &str) -> Result<Regex> {
    Regex::new(&format!(r#"(?m)^{key}:\s*"(.*?)""#))
        .with_context(|| format!("compiling textproto pattern for {key}"))
}

/// Matches `key: 123` at line start and captures the digits.
pub(crate) fn number_re(key: &str) -> Result<Regex> {
    Regex::new(&format!(r"(?m)^{key}:\s*(\d+)"))
        .with_context(|| format!("compiling textproto pattern for {key}"))
}

/// Matches a flat `key { ... }` block at line start and captures its body.
/// Nested blocks are not supported; the match ends at the first closing
/// brace, which is sufficient for every block this pipeline reads.
pub(crate) fn block_re(key: &str) -> Result<Regex> {
    Regex::new(&format!(r#"(?ms)^{key}\s*\{{(.*?)\}}"#))
        .with_context(|| format!("compiling textproto pattern for {key}"))
}

/// Undoes the escape sequences that actually occur in corpus string
/// values. Anything more exotic passes through untouched.
pub(crate) fn unescape(raw: &str) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_matches_line_start_only() {
        let re = scalar_re("name").expect("compile");
        let content = "fonts {\n  name: \"Inner\"\n}\nname: \"Outer\"\n";
        let caps = re.captures(content).expect("match");
        assert_eq!(&caps[1], "Outer");
    }

    #[test]
    fn block_captures_flat_body() {
        let re = block_re("fonts").expect("compile");
        let content = "fonts {\n  weight: 400\n}\nfonts {\n  weight: 700\n}\n";
        let bodies: Vec<&str> = re
            .captures_iter(content)
            .map(|c| c.get(1).expect("body").as_str())
            .collect();
        assert_eq!(bodies.len(), 2);
        assert!(bodies[0].contains("400"));
        assert!(bodies[1].contains("700"));
    }

    #[test]
    fn unescape_handles_common_sequences() {
        assert_eq!(unescape(r#"a\"b"#), "a\"b");
        assert_eq!(unescape(r"line\nbreak"), "line\nbreak");
        assert_eq!(unescape(r"back\\slash"), "back\\slash");
        assert_eq!(unescape(r"\q"), "\\q");
        assert_eq!(unescape("plain"), "plain");
    }
}
