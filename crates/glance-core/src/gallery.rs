//! Gallery contract over the persistence collaborator.
//!
//! Validates faces before they reach the store, maps store lookups onto the
//! engine's error taxonomy, and owns the rollback semantics that keep the
//! gallery free of zero-face identities.

use crate::matcher::Candidate;
use crate::store::{FaceStore, StoreError};
use crate::types::{Identity, NewFace};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("identity or face not found: {0}")]
    NotFound(String),
    #[error("face is missing an embedding or image")]
    InvalidFace,
    #[error("persistence failure: {0}")]
    Persistence(StoreError),
}

fn map_store(err: StoreError) -> GalleryError {
    match err {
        StoreError::IdentityNotFound(id) | StoreError::FaceNotFound(id) => {
            GalleryError::NotFound(id)
        }
        other => GalleryError::Persistence(other),
    }
}

/// The set of known identities and faces, backed by a persistence
/// collaborator.
pub struct Gallery<S: FaceStore> {
    store: S,
}

impl<S: FaceStore> Gallery<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Comparison set for matching: one candidate per stored face, identity
    /// faces first, then standalone records, all in storage order.
    pub async fn candidates(&self) -> Result<Vec<Candidate>, GalleryError> {
        let mut out = Vec::new();
        for identity in self.store.list_identities().await.map_err(map_store)? {
            for face in &identity.faces {
                out.push(Candidate {
                    face_id: face.id.clone(),
                    identity_id: Some(identity.id.clone()),
                    name: Some(identity.name.clone()),
                    notes: identity.notes.clone(),
                    notify: identity.notify,
                    embedding: face.embedding.clone(),
                });
            }
        }
        for face in self.store.list_standalone_faces().await.map_err(map_store)? {
            out.push(Candidate {
                face_id: face.id.clone(),
                identity_id: None,
                name: None,
                notes: face.note.clone(),
                notify: face.notify,
                embedding: face.embedding,
            });
        }
        Ok(out)
    }

    pub async fn list_identities(&self) -> Result<Vec<Identity>, GalleryError> {
        self.store.list_identities().await.map_err(map_store)
    }

    /// Append a face to an existing identity.
    pub async fn add_face(
        &mut self,
        identity_id: &str,
        face: &NewFace,
    ) -> Result<String, GalleryError> {
        if !face.is_valid() {
            return Err(GalleryError::InvalidFace);
        }
        self.store
            .insert_face(Some(identity_id), face)
            .await
            .map_err(map_store)
    }

    /// Create a new identity seeded with one face.
    ///
    /// If the face insert fails after the identity row was created, the
    /// identity is rolled back so the gallery never holds an orphan with
    /// zero faces.
    pub async fn create_identity(
        &mut self,
        name: &str,
        face: &NewFace,
    ) -> Result<String, GalleryError> {
        if !face.is_valid() {
            return Err(GalleryError::InvalidFace);
        }
        let identity_id = self.store.insert_identity(name).await.map_err(map_store)?;
        if let Err(err) = self.store.insert_face(Some(&identity_id), face).await {
            tracing::warn!(
                identity_id = %identity_id,
                error = %err,
                "face insert failed; rolling back identity"
            );
            if let Err(rollback) = self.store.delete_identity(&identity_id).await {
                tracing::error!(
                    identity_id = %identity_id,
                    error = %rollback,
                    "identity rollback failed, orphan left in store"
                );
            }
            return Err(map_store(err));
        }
        Ok(identity_id)
    }

    /// Store a face that belongs to no identity, for deployments that keep
    /// captures without clustering them. The daemon's auto-save path does
    /// not use this; it clusters unrecognized detections into identities.
    pub async fn save_standalone(&mut self, face: &NewFace) -> Result<String, GalleryError> {
        if !face.is_valid() {
            return Err(GalleryError::InvalidFace);
        }
        self.store.insert_face(None, face).await.map_err(map_store)
    }

    pub async fn rename_identity(&mut self, id: &str, name: &str) -> Result<(), GalleryError> {
        self.store
            .update_identity(id, Some(name), None, None)
            .await
            .map_err(map_store)
    }

    pub async fn set_notify(&mut self, id: &str, notify: bool) -> Result<(), GalleryError> {
        self.store
            .update_identity(id, None, None, Some(notify))
            .await
            .map_err(map_store)
    }

    /// Delete an identity and, by cascade, all faces it owns.
    pub async fn remove_identity(&mut self, id: &str) -> Result<(), GalleryError> {
        self.store.delete_identity(id).await.map_err(map_store)
    }

    /// Delete a single face. An identity left with zero faces is deleted as
    /// well: a person with no reference embeddings can never match again.
    pub async fn remove_face(&mut self, face_id: &str) -> Result<(), GalleryError> {
        let owner = self
            .store
            .list_identities()
            .await
            .map_err(map_store)?
            .into_iter()
            .find(|i| i.faces.iter().any(|f| f.id == face_id));

        self.store.delete_face(face_id).await.map_err(map_store)?;

        if let Some(identity) = owner {
            if identity.faces.len() == 1 {
                tracing::info!(
                    identity_id = %identity.id,
                    "last face removed, deleting empty identity"
                );
                self.store.delete_identity(&identity.id).await.map_err(map_store)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{Embedding, FaceRecord};

    fn face(values: Vec<f32>) -> NewFace {
        NewFace::new(Embedding::new(values), vec![1, 2, 3])
    }

    #[tokio::test]
    async fn test_create_identity_and_candidates() {
        let mut gallery = Gallery::new(MemoryStore::new());
        let person = gallery.create_identity("Ada", &face(vec![0.1, 0.2])).await.unwrap();

        let candidates = gallery.candidates().await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].identity_id.as_deref(), Some(person.as_str()));
        assert_eq!(candidates[0].name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn test_invalid_face_rejected() {
        let mut gallery = Gallery::new(MemoryStore::new());

        let no_image = NewFace::new(Embedding::new(vec![0.1]), vec![]);
        assert!(matches!(
            gallery.create_identity("Ada", &no_image).await,
            Err(GalleryError::InvalidFace)
        ));

        let no_embedding = NewFace::new(Embedding::new(vec![]), vec![1]);
        assert!(matches!(
            gallery.save_standalone(&no_embedding).await,
            Err(GalleryError::InvalidFace)
        ));
    }

    #[tokio::test]
    async fn test_add_face_unknown_identity_is_not_found() {
        let mut gallery = Gallery::new(MemoryStore::new());
        assert!(matches!(
            gallery.add_face("nope", &face(vec![0.1])).await,
            Err(GalleryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_standalone_candidates_have_no_identity() {
        let mut gallery = Gallery::new(MemoryStore::new());
        gallery.save_standalone(&face(vec![0.5])).await.unwrap();

        let candidates = gallery.candidates().await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].identity_id.is_none());
        assert!(candidates[0].name.is_none());
    }

    #[tokio::test]
    async fn test_remove_last_face_deletes_identity() {
        let mut gallery = Gallery::new(MemoryStore::new());
        gallery.create_identity("Ada", &face(vec![0.1])).await.unwrap();

        let face_id = gallery.list_identities().await.unwrap()[0].faces[0].id.clone();
        gallery.remove_face(&face_id).await.unwrap();

        assert!(gallery.list_identities().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_face_keeps_identity_with_remaining_faces() {
        let mut gallery = Gallery::new(MemoryStore::new());
        let person = gallery.create_identity("Ada", &face(vec![0.1])).await.unwrap();
        gallery.add_face(&person, &face(vec![0.2])).await.unwrap();

        let face_id = gallery.list_identities().await.unwrap()[0].faces[0].id.clone();
        gallery.remove_face(&face_id).await.unwrap();

        let identities = gallery.list_identities().await.unwrap();
        assert_eq!(identities.len(), 1);
        assert_eq!(identities[0].faces.len(), 1);
    }

    /// Store double whose face inserts always fail, for rollback coverage.
    #[derive(Default)]
    struct FailingFaceStore {
        inner: MemoryStore,
    }

    impl FaceStore for FailingFaceStore {
        async fn list_identities(&self) -> Result<Vec<Identity>, StoreError> {
            self.inner.list_identities().await
        }
        async fn list_standalone_faces(&self) -> Result<Vec<FaceRecord>, StoreError> {
            self.inner.list_standalone_faces().await
        }
        async fn get_identity(&self, id: &str) -> Result<Option<Identity>, StoreError> {
            self.inner.get_identity(id).await
        }
        async fn insert_identity(&mut self, name: &str) -> Result<String, StoreError> {
            self.inner.insert_identity(name).await
        }
        async fn update_identity(
            &mut self,
            id: &str,
            name: Option<&str>,
            notes: Option<&str>,
            notify: Option<bool>,
        ) -> Result<(), StoreError> {
            self.inner.update_identity(id, name, notes, notify).await
        }
        async fn insert_face(
            &mut self,
            _identity_id: Option<&str>,
            _face: &NewFace,
        ) -> Result<String, StoreError> {
            Err(StoreError::Backend("disk full".into()))
        }
        async fn delete_identity(&mut self, id: &str) -> Result<(), StoreError> {
            self.inner.delete_identity(id).await
        }
        async fn delete_face(&mut self, id: &str) -> Result<(), StoreError> {
            self.inner.delete_face(id).await
        }
    }

    #[tokio::test]
    async fn test_create_identity_rolls_back_on_face_failure() {
        let mut gallery = Gallery::new(FailingFaceStore::default());
        let err = gallery.create_identity("Ada", &face(vec![0.1])).await.unwrap_err();
        assert!(matches!(err, GalleryError::Persistence(_)));

        // No orphan identity with zero faces may remain.
        assert!(gallery.list_identities().await.unwrap().is_empty());
    }
}
