//! Strips wire-boilerplate lines (photo credits, anchor/reporter markers,
//! bylines, subscribe prompts) before sentence splitting.

use std::sync::LazyLock;

use regex::Regex;

static JUNK_LINE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // Dateline + wire-photo credit captions, e.g. "(Washington) AP/File photo"
        Regex::new(r"(?i)^\s*\([A-Za-z .]+\)\s*(AP|Reuters|Wire)\s*/?\s*(file photo|photo)\s*$")
            .unwrap(),
        // Bracketed broadcast-segment markers.
        Regex::new(r"(?i)^\s*\[(anchor|reporter|correspondent)\]\s*").unwrap(),
        // Bylines and signature blocks.
        Regex::new(r"(?i)^\s*by\s+[A-Z][a-z]+(\s+[A-Z][a-z]+)*\s*$").unwrap(),
        Regex::new(r"(?i)^\s*(contact|email|reach)\s+.*@.*$").unwrap(),
        Regex::new(r"(?i)^\s*(subscribe|sign up)\s+(to|for)\b.*$").unwrap(),
        Regex::new(r"(?i)^\s*copyright\s+\d{4}.*$").unwrap(),
        // Short all-caps bracket captions, e.g. "[FILE]"
        Regex::new(r"^\s*\[[A-Z ]{2,20}\]\s*$").unwrap(),
    ]
});

fn is_junk_line(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return true;
    }
    JUNK_LINE_PATTERNS.iter().any(|re| re.is_match(trimmed))
}

/// Decode the handful of HTML entities that leak into RSS summary/description
/// text (full HTML is already stripped upstream by the extractor).
fn decode_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
}

/// Collapse HTML entities, normalize newlines, drop junk boilerplate lines,
/// and collapse runs of whitespace/blank lines.
pub fn preclean(raw: &str) -> String {
    let unescaped = decode_entities(raw);
    let normalized = unescaped.replace("\r\n", "\n").replace('\r', "\n");

    let cleaned_lines: Vec<&str> = normalized
        .lines()
        .map(|l| l.trim())
        .filter(|l| !is_junk_line(l))
        .collect();

    let joined = cleaned_lines.join("\n");
    let collapse_blank = regex_static_collapse_blank();
    let joined = collapse_blank.replace_all(&joined, "\n\n").into_owned();
    let collapse_ws = regex_static_collapse_ws();
    collapse_ws.replace_all(&joined, " ").trim().to_string()
}

fn regex_static_collapse_blank() -> &'static Regex {
    static RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
    &RE
}

fn regex_static_collapse_ws() -> &'static Regex {
    static RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]{2,}").unwrap());
    &RE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_anchor_markers() {
        let text = "[Anchor] Welcome back.\nThe senate voted today.";
        let cleaned = preclean(text);
        assert!(!cleaned.contains("[Anchor]"));
        assert!(cleaned.contains("senate voted"));
    }

    #[test]
    fn drops_byline_and_photo_credit() {
        let text = "By Jane Smith\n(Washington) AP/File photo\nThe bill passed 51-49.";
        let cleaned = preclean(text);
        assert_eq!(cleaned, "The bill passed 51-49.");
    }
}
