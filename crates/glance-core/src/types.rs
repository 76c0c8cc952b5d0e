use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Face embedding vector (128-dimensional for the bundled extractor model).
///
/// Immutable after creation. Serialized as a plain JSON array of numbers in
/// `values`, which is the wire format persistence backends are expected to
/// round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding.
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            model_version: None,
        }
    }

    /// An embedding is usable for matching only if it is non-empty.
    pub fn is_valid(&self) -> bool {
        !self.values.is_empty()
    }

    /// Euclidean (L2) distance to another embedding. Lower = more similar.
    ///
    /// Mismatched lengths return `+infinity` ("incomparable") rather than an
    /// error, so one bad detection never halts a live loop.
    pub fn distance(&self, other: &Embedding) -> f32 {
        if self.values.len() != other.values.len() {
            return f32::INFINITY;
        }
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }

    /// Display similarity: `1 - distance`, unclamped. May go negative for
    /// poor matches. Presentational only; threshold checks always use the
    /// raw distance.
    pub fn display_similarity(&self, other: &Embedding) -> f32 {
        1.0 - self.distance(other)
    }
}

/// A stored face capture, owned by at most one identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceRecord {
    pub id: String,
    pub embedding: Embedding,
    /// Opaque encoded image blob; never inspected by the engine.
    pub image: Vec<u8>,
    pub captured_at: DateTime<Utc>,
    pub note: Option<String>,
    /// Owning identity, if clustered. `None` marks a standalone record.
    pub identity_id: Option<String>,
    /// Tri-state notify preference: explicit `false` suppresses
    /// notifications, `true` and unset both permit them.
    pub notify: Option<bool>,
}

/// A named cluster of face records believed to be the same individual.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub notes: Option<String>,
    pub notify: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Owned faces, oldest first.
    pub faces: Vec<FaceRecord>,
}

/// A freshly captured face on its way into the gallery.
#[derive(Debug, Clone)]
pub struct NewFace {
    pub embedding: Embedding,
    pub image: Vec<u8>,
    pub captured_at: DateTime<Utc>,
    pub note: Option<String>,
}

impl NewFace {
    pub fn new(embedding: Embedding, image: Vec<u8>) -> Self {
        Self {
            embedding,
            image,
            captured_at: Utc::now(),
            note: None,
        }
    }

    /// Storable only with a non-empty embedding and image.
    pub fn is_valid(&self) -> bool {
        self.embedding.is_valid() && !self.image.is_empty()
    }
}

/// Optional demographic metadata some extractor models supply.
///
/// The engine never acts on these; they ride along for display.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FaceAttributes {
    pub age: Option<f32>,
    pub gender: Option<String>,
    pub expression: Option<String>,
}

/// One detected face in a frame, as produced by the embedding extractor.
#[derive(Debug, Clone)]
pub struct Detection {
    pub embedding: Embedding,
    /// Encoded crop of the detected face.
    pub crop: Vec<u8>,
    pub attributes: Option<FaceAttributes>,
}

impl Detection {
    pub fn new(embedding: Embedding, crop: Vec<u8>) -> Self {
        Self {
            embedding,
            crop,
            attributes: None,
        }
    }
}

/// A recognition notification. Immutable once created, except for `read`;
/// retained by the event feed for history queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionEvent {
    pub id: String,
    pub identity_id: Option<String>,
    pub face_id: Option<String>,
    pub name: String,
    pub recognized_at: DateTime<Utc>,
    pub snapshot: Option<Vec<u8>>,
    pub read: bool,
}

impl RecognitionEvent {
    /// Build an unread event stamped now.
    pub fn new(
        name: impl Into<String>,
        identity_id: Option<String>,
        face_id: Option<String>,
        snapshot: Option<Vec<u8>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            identity_id,
            face_id,
            name: name.into(),
            recognized_at: Utc::now(),
            snapshot,
            read: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_identical_is_zero() {
        let a = Embedding::new(vec![0.3, -1.2, 4.5]);
        assert_eq!(a.distance(&a), 0.0);
    }

    #[test]
    fn test_distance_symmetric() {
        let a = Embedding::new(vec![1.0, 2.0, 3.0]);
        let b = Embedding::new(vec![4.0, 6.0, 3.0]);
        assert_eq!(a.distance(&b), b.distance(&a));
        assert_eq!(a.distance(&b), 5.0);
    }

    #[test]
    fn test_distance_length_mismatch_is_infinite() {
        let a = Embedding::new(vec![1.0, 2.0]);
        let b = Embedding::new(vec![1.0, 2.0, 3.0]);
        assert_eq!(a.distance(&b), f32::INFINITY);
        assert_eq!(b.distance(&a), f32::INFINITY);
    }

    #[test]
    fn test_display_similarity_unclamped() {
        let a = Embedding::new(vec![0.0, 0.0]);
        let b = Embedding::new(vec![3.0, 4.0]);
        // distance 5 → similarity -4; negative is fine, it's display-only
        assert_eq!(a.display_similarity(&b), -4.0);
    }

    #[test]
    fn test_empty_embedding_is_invalid() {
        assert!(!Embedding::new(vec![]).is_valid());
        assert!(Embedding::new(vec![0.0]).is_valid());
    }

    #[test]
    fn test_embedding_serializes_as_number_array() {
        let e = Embedding::new(vec![1.0, 2.5]);
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["values"], serde_json::json!([1.0, 2.5]));
    }

    #[test]
    fn test_new_face_validity() {
        let good = NewFace::new(Embedding::new(vec![0.1; 128]), vec![0xFF, 0xD8]);
        assert!(good.is_valid());

        let no_image = NewFace::new(Embedding::new(vec![0.1; 128]), vec![]);
        assert!(!no_image.is_valid());

        let no_embedding = NewFace::new(Embedding::new(vec![]), vec![0xFF, 0xD8]);
        assert!(!no_embedding.is_valid());
    }

    #[test]
    fn test_recognition_event_starts_unread() {
        let e = RecognitionEvent::new("Ada", Some("p1".into()), None, None);
        assert!(!e.read);
        assert!(!e.id.is_empty());
    }
}
