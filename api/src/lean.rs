//! Political-lean taxonomy: press-name classification and the opposing
//! relation used by the recommendation engine.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lean {
    Progressive,
    Conservative,
    Centrist,
}

impl Lean {
    pub fn as_str(self) -> &'static str {
        match self {
            Lean::Progressive => "progressive",
            Lean::Conservative => "conservative",
            Lean::Centrist => "centrist",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "progressive" => Some(Lean::Progressive),
            "conservative" => Some(Lean::Conservative),
            "centrist" => Some(Lean::Centrist),
            _ => None,
        }
    }

    /// Leans this lean is considered opposite to. The relation is
    /// symmetric but not reflexive: centrist opposes both progressive and
    /// conservative, and is in turn opposed by both.
    pub fn opposites(self) -> &'static [Lean] {
        match self {
            Lean::Progressive => &[Lean::Conservative],
            Lean::Conservative => &[Lean::Progressive],
            Lean::Centrist => &[Lean::Progressive, Lean::Conservative],
        }
    }

    pub fn is_opposite(self, other: Lean) -> bool {
        self.opposites().contains(&other)
    }
}

/// Static press-name -> lean mapping. Names are the source names stored on
/// article rows (`article.source`).
const PRESS_LEAN: &[(&str, Lean)] = &[
    ("The Daily Current", Lean::Progressive),
    ("Harbor Herald", Lean::Progressive),
    ("Civic Ledger", Lean::Progressive),
    ("Plainsview Post", Lean::Progressive),
    ("The Open Record", Lean::Progressive),
    ("The National Sentinel", Lean::Conservative),
    ("Liberty Wire", Lean::Conservative),
    ("Heartland Register", Lean::Conservative),
    ("The Constitutionalist", Lean::Conservative),
    ("Frontier Tribune", Lean::Conservative),
    ("Wire Service Daily", Lean::Centrist),
    ("The Balance Report", Lean::Centrist),
    ("Capitol Briefing", Lean::Centrist),
    ("Crossline News", Lean::Centrist),
];

/// Host substrings used to infer a press name when an article's lean is
/// missing and must be derived from its URL host.
const HOST_PRESS: &[(&str, &str)] = &[
    ("dailycurrent.example", "The Daily Current"),
    ("harborherald.example", "Harbor Herald"),
    ("civicledger.example", "Civic Ledger"),
    ("plainsviewpost.example", "Plainsview Post"),
    ("theopenrecord.example", "The Open Record"),
    ("nationalsentinel.example", "The National Sentinel"),
    ("libertywire.example", "Liberty Wire"),
    ("heartlandregister.example", "Heartland Register"),
    ("constitutionalist.example", "The Constitutionalist"),
    ("frontiertribune.example", "Frontier Tribune"),
    ("wireservicedaily.example", "Wire Service Daily"),
    ("thebalancereport.example", "The Balance Report"),
    ("capitolbriefing.example", "Capitol Briefing"),
    ("crosslinenews.example", "Crossline News"),
];

pub fn lean_for_press(press: &str) -> Option<Lean> {
    PRESS_LEAN
        .iter()
        .find(|(name, _)| *name == press)
        .map(|(_, lean)| *lean)
}

pub fn press_for_host(host: &str) -> Option<&'static str> {
    HOST_PRESS
        .iter()
        .find(|(substr, _)| host.contains(substr))
        .map(|(_, press)| *press)
}

/// Derive a lean for an article: use the stored lean if present, else
/// derive the press name from the host and look it up. Unknown sources
/// return `None` ("unknown").
pub fn infer_lean(stored_lean: Option<&str>, host: Option<&str>) -> Option<Lean> {
    if let Some(l) = stored_lean.and_then(Lean::parse) {
        return Some(l);
    }
    let press = host.and_then(press_for_host)?;
    lean_for_press(press)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centrist_opposes_both_sides() {
        assert!(Lean::Centrist.is_opposite(Lean::Progressive));
        assert!(Lean::Centrist.is_opposite(Lean::Conservative));
        assert!(Lean::Progressive.is_opposite(Lean::Centrist));
    }

    #[test]
    fn progressive_conservative_are_mutually_opposite() {
        assert!(Lean::Progressive.is_opposite(Lean::Conservative));
        assert!(Lean::Conservative.is_opposite(Lean::Progressive));
    }

    #[test]
    fn not_reflexive() {
        assert!(!Lean::Progressive.is_opposite(Lean::Progressive));
        assert!(!Lean::Centrist.is_opposite(Lean::Centrist));
    }

    #[test]
    fn infers_from_host_when_lean_missing() {
        let lean = infer_lean(None, Some("www.libertywire.example"));
        assert_eq!(lean, Some(Lean::Conservative));
    }
}
