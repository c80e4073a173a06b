//! Sentence splitting for already-precleaned English text.

use std::sync::LazyLock;

use regex::Regex;

static TERMINATOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]+(?:\s+|$)").unwrap());

static TRAILING_CAPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*\((photo|wire photo|file photo)[^)]*\)\s*$").unwrap());

const MIN_SENTENCE_LEN: usize = 6;

fn is_junk_sentence(s: &str) -> bool {
    s.len() <= 5
}

/// A plain punctuation-based splitter: no lookaround is used (the `regex`
/// crate doesn't support it), so runs on abbreviations like "U.S." are not
/// special-cased — this mirrors the original system's own regex fallback
/// path, used whenever a proper sentence tokenizer isn't available.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut last = 0;
    for m in TERMINATOR_RE.find_iter(text) {
        let end = m.end();
        sentences.push(text[last..end].to_string());
        last = end;
    }
    if last < text.len() {
        sentences.push(text[last..].to_string());
    }

    sentences
        .into_iter()
        .map(|s| TRAILING_CAPTION_RE.replace(&s, "").trim().to_string())
        .filter(|s| s.len() >= MIN_SENTENCE_LEN && !is_junk_sentence(s))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_terminal_punctuation() {
        let text = "The bill passed. It now goes to the governor. Reaction was swift.";
        let sentences = split_sentences(text);
        assert_eq!(sentences.len(), 3);
    }

    #[test]
    fn drops_trailing_photo_caption() {
        let text = "The mayor spoke at the rally (wire photo credit).";
        let sentences = split_sentences(text);
        assert_eq!(sentences[0], "The mayor spoke at the rally.");
    }

    #[test]
    fn drops_too_short_fragments() {
        let text = "Ok. The senate passed the measure after a long debate.";
        let sentences = split_sentences(text);
        assert_eq!(sentences.len(), 1);
    }
}
