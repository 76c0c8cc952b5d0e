//! glance-core — Identity matching and clustering for face embeddings.
//!
//! Matches incoming face embeddings against a gallery of known identities
//! and decides whether new captures merge into an existing identity or seed
//! a new one. Recognition notifications are throttled per identity.
//!
//! Detection and embedding extraction are a collaborator concern; this crate
//! only consumes fixed-length numeric vectors.

pub mod cluster;
pub mod gallery;
pub mod matcher;
pub mod store;
pub mod throttle;
pub mod types;

pub use cluster::{Assignment, CandidateScope, ClusterConfig, LiveMatch};
pub use gallery::{Gallery, GalleryError};
pub use matcher::{Candidate, Match, Matcher, NearestMatcher};
pub use store::{FaceStore, MemoryStore, StoreError};
pub use throttle::{Clock, SystemClock, Throttle};
pub use types::{
    Detection, Embedding, FaceAttributes, FaceRecord, Identity, NewFace, RecognitionEvent,
};
