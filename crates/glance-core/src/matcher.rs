//! Nearest-neighbor matching of a probe embedding against gallery candidates.

use crate::types::Embedding;

/// A matching candidate: one stored face embedding plus enough context to
/// act on a hit.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub face_id: String,
    /// Owning identity, `None` for standalone face records.
    pub identity_id: Option<String>,
    /// Display name of the owning identity.
    pub name: Option<String>,
    pub notes: Option<String>,
    /// Person-level notify preference (explicit `false` suppresses).
    pub notify: Option<bool>,
    pub embedding: Embedding,
}

/// Best match for a probe embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    /// Index into the candidate slice that was searched.
    pub index: usize,
    pub distance: f32,
}

/// Strategy for finding the closest gallery candidate to a probe.
pub trait Matcher {
    /// Returns the candidate with the minimum distance to the probe, or
    /// `None` if the candidate set is empty or no distance is below the
    /// threshold. "No match" is a valid outcome, never an error.
    fn find_best(
        &self,
        probe: &Embedding,
        candidates: &[Candidate],
        threshold: f32,
    ) -> Option<Match>;
}

/// Full-scan L2 nearest-neighbor matcher.
///
/// Pure and side-effect free. Ties keep the first-seen candidate, so the
/// result is deterministic whenever the candidate order is. Candidates with
/// missing embeddings are skipped (logged, not fatal) and can never win.
pub struct NearestMatcher;

impl Matcher for NearestMatcher {
    fn find_best(
        &self,
        probe: &Embedding,
        candidates: &[Candidate],
        threshold: f32,
    ) -> Option<Match> {
        if !probe.is_valid() {
            return None;
        }

        let mut best: Option<Match> = None;
        for (index, candidate) in candidates.iter().enumerate() {
            if !candidate.embedding.is_valid() {
                tracing::debug!(
                    face_id = %candidate.face_id,
                    "skipping candidate with missing embedding"
                );
                continue;
            }
            let distance = probe.distance(&candidate.embedding);
            let better = match &best {
                None => true,
                Some(b) => distance < b.distance,
            };
            if better {
                best = Some(Match { index, distance });
            }
        }

        best.filter(|m| m.distance < threshold)
    }
}
