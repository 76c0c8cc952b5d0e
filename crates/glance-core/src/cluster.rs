//! Clustering policy: when does an embedding belong to a known identity?
//!
//! Two decisions share the same L2 metric but use different thresholds. The
//! live threshold is looser than the storage threshold on purpose: a live
//! false accept shows a wrong name for a moment, while a storage false
//! accept permanently pollutes an identity's reference embeddings.

use crate::gallery::{Gallery, GalleryError};
use crate::matcher::{Candidate, Matcher, NearestMatcher};
use crate::store::FaceStore;
use crate::types::{Embedding, NewFace};
use std::collections::HashSet;

/// Maximum distance for a live "this is a known face" hit.
pub const DEFAULT_LIVE_THRESHOLD: f32 = 0.5;
/// Maximum distance for merging a capture into an existing identity.
pub const DEFAULT_STORAGE_THRESHOLD: f32 = 0.55;

/// Which stored embeddings storage-time clustering compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CandidateScope {
    /// Every stored face embedding across all identities (reference
    /// behavior: any one close-enough face wins).
    #[default]
    AllFaces,
    /// One representative per identity: its oldest face. Cheaper, and less
    /// prone to drift as an identity accumulates faces.
    PerIdentity,
}

/// Thresholds and knobs for the clustering policy.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub live_threshold: f32,
    pub storage_threshold: f32,
    pub scope: CandidateScope,
    /// Cluster unrecognized live detections into the gallery automatically.
    pub auto_save_unrecognized: bool,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            live_threshold: DEFAULT_LIVE_THRESHOLD,
            storage_threshold: DEFAULT_STORAGE_THRESHOLD,
            scope: CandidateScope::default(),
            auto_save_unrecognized: false,
        }
    }
}

/// A live-recognition hit against a stored face.
#[derive(Debug, Clone)]
pub struct LiveMatch {
    pub face_id: String,
    pub identity_id: Option<String>,
    pub name: Option<String>,
    pub notes: Option<String>,
    /// Person-level notify preference of the matched identity or face.
    pub notify: Option<bool>,
    pub distance: f32,
    /// Presentational `1 - distance`, unclamped.
    pub similarity: f32,
}

/// Live recognition for one detected face.
///
/// Compares the probe against every stored face embedding directly, never an
/// averaged identity embedding: an identity with several reference faces is
/// correspondingly easier to match, and no consensus across its faces is
/// required.
pub fn recognize(
    probe: &Embedding,
    candidates: &[Candidate],
    config: &ClusterConfig,
) -> Option<LiveMatch> {
    let hit = NearestMatcher.find_best(probe, candidates, config.live_threshold)?;
    let candidate = &candidates[hit.index];
    Some(LiveMatch {
        face_id: candidate.face_id.clone(),
        identity_id: candidate.identity_id.clone(),
        name: candidate.name.clone(),
        notes: candidate.notes.clone(),
        notify: candidate.notify,
        distance: hit.distance,
        similarity: 1.0 - hit.distance,
    })
}

/// Terminal state of a captured face after storage-time clustering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    /// Face joined an existing identity.
    Merged { identity_id: String, face_id: String },
    /// Face seeded a new identity.
    Created { identity_id: String, face_id: String },
    /// Face was unusable and dropped without touching the gallery.
    Discarded(DiscardReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    MissingEmbedding,
    MissingImage,
}

/// Reduce the comparison set to the configured scope. Candidates stay in
/// first-seen order, so `PerIdentity` keeps each identity's oldest face.
pub fn scoped(candidates: &[Candidate], scope: CandidateScope) -> Vec<Candidate> {
    match scope {
        CandidateScope::AllFaces => candidates.to_vec(),
        CandidateScope::PerIdentity => {
            let mut seen = HashSet::new();
            candidates
                .iter()
                .filter(|c| match &c.identity_id {
                    Some(id) => seen.insert(id.clone()),
                    None => true,
                })
                .cloned()
                .collect()
        }
    }
}

/// Storage-time clustering for an explicit capture or upload.
///
/// Merges the face into the nearest identity within the storage threshold,
/// otherwise seeds a new identity named `name`. Only identity-owned faces
/// anchor merges; standalone records never attract captures.
pub async fn assign<S: FaceStore>(
    gallery: &mut Gallery<S>,
    face: &NewFace,
    name: &str,
    config: &ClusterConfig,
) -> Result<Assignment, GalleryError> {
    if !face.embedding.is_valid() {
        return Ok(Assignment::Discarded(DiscardReason::MissingEmbedding));
    }
    if face.image.is_empty() {
        return Ok(Assignment::Discarded(DiscardReason::MissingImage));
    }

    let all = gallery.candidates().await?;
    let pool: Vec<Candidate> = scoped(&all, config.scope)
        .into_iter()
        .filter(|c| c.identity_id.is_some())
        .collect();

    match NearestMatcher.find_best(&face.embedding, &pool, config.storage_threshold) {
        Some(hit) => {
            // Filter above guarantees an owning identity.
            let Some(identity_id) = pool[hit.index].identity_id.clone() else {
                return Err(GalleryError::NotFound(pool[hit.index].face_id.clone()));
            };
            let face_id = gallery.add_face(&identity_id, face).await?;
            tracing::info!(
                identity_id = %identity_id,
                face_id = %face_id,
                distance = hit.distance,
                "capture merged into existing identity"
            );
            Ok(Assignment::Merged { identity_id, face_id })
        }
        None => {
            let identity_id = gallery.create_identity(name, face).await?;
            let identities = gallery.list_identities().await?;
            let face_id = identities
                .iter()
                .find(|i| i.id == identity_id)
                .and_then(|i| i.faces.first())
                .map(|f| f.id.clone())
                .ok_or_else(|| GalleryError::NotFound(identity_id.clone()))?;
            tracing::info!(
                identity_id = %identity_id,
                face_id = %face_id,
                "capture stored as new identity"
            );
            Ok(Assignment::Created { identity_id, face_id })
        }
    }
}
