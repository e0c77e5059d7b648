//! The threat-pattern library: a fixed enumerated set of
//! social-engineering patterns matched against event text by keyword
//! co-occurrence, explicitly not an ML/NLP dependency — treated as an
//! opaque oracle the same way retrieval and embeddings are.

use serde::{Deserialize, Serialize};

/// The six enumerated threat patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatPatternKind {
    BankCardScam,
    SsnScam,
    GiftCardScam,
    IrsImpersonation,
    GrandchildEmergency,
    TechSupportScam,
}

/// A keyword-weighted matcher for one threat pattern.
#[derive(Debug, Clone)]
pub struct ThreatPattern {
    pub kind: ThreatPatternKind,
    /// Keywords/phrases whose presence raises confidence; matched
    /// case-insensitively as substrings.
    pub keywords: &'static [&'static str],
}

/// A positive match against the library, with the matched pattern's
/// confidence (fraction of its keywords present, capped at 1.0).
#[derive(Debug, Clone, Copy)]
pub struct ThreatMatch {
    pub kind: ThreatPatternKind,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ThreatPatternLibrary {
    patterns: Vec<ThreatPattern>,
}

impl ThreatPatternLibrary {
    pub fn new(patterns: Vec<ThreatPattern>) -> Self {
        Self { patterns }
    }

    /// The default library: bank-card-scam, ssn-scam, gift-card-scam,
    /// irs-impersonation, grandchild-emergency, tech-support-scam.
    pub fn default_library() -> Self {
        Self::new(vec![
            ThreatPattern {
                kind: ThreatPatternKind::BankCardScam,
                keywords: &["card number", "cvv", "expiration date", "card is blocked", "verify your card"],
            },
            ThreatPattern {
                kind: ThreatPatternKind::SsnScam,
                keywords: &["social security number", "your ssn", "suspended social security", "confirm your ssn"],
            },
            ThreatPattern {
                kind: ThreatPatternKind::GiftCardScam,
                keywords: &["gift card", "gift cards", "read me the code", "itunes card", "google play card"],
            },
            ThreatPattern {
                kind: ThreatPatternKind::IrsImpersonation,
                keywords: &["irs", "internal revenue service", "tax warrant", "owe back taxes", "arrest warrant"],
            },
            ThreatPattern {
                kind: ThreatPatternKind::GrandchildEmergency,
                keywords: &["grandma it's me", "i'm in jail", "don't tell mom and dad", "need bail money", "car accident"],
            },
            ThreatPattern {
                kind: ThreatPatternKind::TechSupportScam,
                keywords: &["your computer has a virus", "remote access", "microsoft support", "install teamviewer"],
            },
        ])
    }

    /// The highest-confidence match across the library, if any keyword hit.
    pub fn best_match(&self, text: &str) -> Option<ThreatMatch> {
        if text.is_empty() {
            return None;
        }
        let lower = text.to_lowercase();
        self.patterns
            .iter()
            .filter_map(|p| {
                let hits = p.keywords.iter().filter(|k| lower.contains(*k)).count();
                if hits == 0 {
                    return None;
                }
                let confidence = (hits as f64 / p.keywords.len() as f64).clamp(0.0, 1.0).max(1.0 / p.keywords.len() as f64);
                Some(ThreatMatch { kind: p.kind, confidence })
            })
            .max_by(|a, b| a.confidence.partial_cmp(&b.confidence).unwrap_or(std::cmp::Ordering::Equal))
    }
}
