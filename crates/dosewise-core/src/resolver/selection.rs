//! Picking the answer out of the sources that found the drug.

use strsim::{jaro_winkler, normalized_levenshtein};
use tracing::warn;

use crate::models::{Confidence, SourceResult};

/// Below this, a source's reported ingredient is logged as a possible mismatch.
pub const MIN_NAME_SIMILARITY: f64 = 0.80;

/// Sources that found the drug, in priority order.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    members: Vec<SourceResult>,
    ai_sourced: bool,
}

impl Selection {
    /// Keep only positive results, preserving slot order.
    pub fn from_authorities(slots: Vec<Option<SourceResult>>) -> Self {
        Self {
            members: slots.into_iter().flatten().filter(|r| r.found).collect(),
            ai_sourced: false,
        }
    }

    /// A selection holding only the AI fallback's answer.
    pub fn from_fallback(result: SourceResult) -> Self {
        Self {
            members: vec![result],
            ai_sourced: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_ai_sourced(&self) -> bool {
        self.ai_sourced
    }

    /// Priority winner. Its fields are used verbatim.
    pub fn best(&self) -> Option<&SourceResult> {
        self.members.first()
    }

    pub fn members(&self) -> &[SourceResult] {
        &self.members
    }

    /// Names of every member, in priority order.
    pub fn source_names(&self) -> Vec<String> {
        self.members.iter().map(|r| r.source.clone()).collect()
    }

    /// Corroboration tier; `None` when nothing was found.
    pub fn tier(&self) -> Option<Confidence> {
        confidence_tier(self.members.len(), self.ai_sourced)
    }
}

/// Two or more agreeing authorities are high, one is medium, AI alone is low.
pub fn confidence_tier(members: usize, ai_sourced: bool) -> Option<Confidence> {
    match (members, ai_sourced) {
        (0, _) => None,
        (_, true) => Some(Confidence::Low),
        (1, false) => Some(Confidence::Medium),
        _ => Some(Confidence::High),
    }
}

/// Similarity of two ingredient names (0.0 - 1.0). Containment counts as a match.
pub fn name_similarity(requested: &str, reported: &str) -> f64 {
    let a = requested.trim().to_lowercase();
    let b = reported.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a.contains(&b) || b.contains(&a) {
        return 1.0;
    }

    jaro_winkler(&a, &b) * 0.6 + normalized_levenshtein(&a, &b) * 0.4
}

/// Log members whose reported ingredient does not resemble the request.
///
/// Advisory only: nothing is filtered. Returns how many members were flagged.
pub fn flag_name_mismatches(requested: &str, members: &[SourceResult]) -> usize {
    let mut flagged = 0;
    for member in members {
        let similarity = name_similarity(requested, &member.ingredient);
        if similarity < MIN_NAME_SIMILARITY {
            warn!(
                source = %member.source,
                requested = %requested,
                reported = %member.ingredient,
                similarity,
                "source reported a different ingredient"
            );
            flagged += 1;
        }
    }
    flagged
}
