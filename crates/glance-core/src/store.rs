//! Persistence collaborator contract, plus the in-memory reference store.

use crate::types::{FaceRecord, Identity, NewFace};
use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("identity not found: {0}")]
    IdentityNotFound(String),
    #[error("face not found: {0}")]
    FaceNotFound(String),
    #[error("storage backend: {0}")]
    Backend(String),
}

/// CRUD contract the engine expects from its persistence collaborator.
///
/// Inserts return the generated id. Deleting an identity cascades to its
/// faces. Implementations serialize embeddings however their backend
/// prefers; the reference wire format is a JSON array of numbers.
// The engine runs on a current-thread runtime, so the returned futures
// carry no Send bound.
#[allow(async_fn_in_trait)]
pub trait FaceStore {
    /// All identities with their faces, in creation order.
    async fn list_identities(&self) -> Result<Vec<Identity>, StoreError>;

    /// Face records that belong to no identity, in capture order.
    async fn list_standalone_faces(&self) -> Result<Vec<FaceRecord>, StoreError>;

    async fn get_identity(&self, id: &str) -> Result<Option<Identity>, StoreError>;

    async fn insert_identity(&mut self, name: &str) -> Result<String, StoreError>;

    /// Partial metadata update; `None` fields are left untouched.
    async fn update_identity(
        &mut self,
        id: &str,
        name: Option<&str>,
        notes: Option<&str>,
        notify: Option<bool>,
    ) -> Result<(), StoreError>;

    /// Insert a face, owned by `identity_id` or standalone when `None`.
    async fn insert_face(
        &mut self,
        identity_id: Option<&str>,
        face: &NewFace,
    ) -> Result<String, StoreError>;

    /// Delete an identity and all faces it owns.
    async fn delete_identity(&mut self, id: &str) -> Result<(), StoreError>;

    async fn delete_face(&mut self, id: &str) -> Result<(), StoreError>;
}

/// In-memory reference store.
///
/// Used by tests and single-process deployments; contents do not survive a
/// restart. Insertion order is preserved so matching stays deterministic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    identities: Vec<Identity>,
    standalone: Vec<FaceRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FaceStore for MemoryStore {
    async fn list_identities(&self) -> Result<Vec<Identity>, StoreError> {
        Ok(self.identities.clone())
    }

    async fn list_standalone_faces(&self) -> Result<Vec<FaceRecord>, StoreError> {
        Ok(self.standalone.clone())
    }

    async fn get_identity(&self, id: &str) -> Result<Option<Identity>, StoreError> {
        Ok(self.identities.iter().find(|i| i.id == id).cloned())
    }

    async fn insert_identity(&mut self, name: &str) -> Result<String, StoreError> {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        self.identities.push(Identity {
            id: id.clone(),
            name: name.to_string(),
            notes: None,
            notify: None,
            created_at: now,
            updated_at: now,
            faces: Vec::new(),
        });
        Ok(id)
    }

    async fn update_identity(
        &mut self,
        id: &str,
        name: Option<&str>,
        notes: Option<&str>,
        notify: Option<bool>,
    ) -> Result<(), StoreError> {
        let identity = self
            .identities
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| StoreError::IdentityNotFound(id.to_string()))?;
        if let Some(name) = name {
            identity.name = name.to_string();
        }
        if let Some(notes) = notes {
            identity.notes = Some(notes.to_string());
        }
        if let Some(notify) = notify {
            identity.notify = Some(notify);
        }
        identity.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_face(
        &mut self,
        identity_id: Option<&str>,
        face: &NewFace,
    ) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let record = FaceRecord {
            id: id.clone(),
            embedding: face.embedding.clone(),
            image: face.image.clone(),
            captured_at: face.captured_at,
            note: face.note.clone(),
            identity_id: identity_id.map(str::to_string),
            notify: None,
        };
        match identity_id {
            Some(owner) => {
                let identity = self
                    .identities
                    .iter_mut()
                    .find(|i| i.id == owner)
                    .ok_or_else(|| StoreError::IdentityNotFound(owner.to_string()))?;
                identity.faces.push(record);
                identity.updated_at = Utc::now();
            }
            None => self.standalone.push(record),
        }
        Ok(id)
    }

    async fn delete_identity(&mut self, id: &str) -> Result<(), StoreError> {
        let before = self.identities.len();
        self.identities.retain(|i| i.id != id);
        if self.identities.len() == before {
            return Err(StoreError::IdentityNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn delete_face(&mut self, id: &str) -> Result<(), StoreError> {
        for identity in &mut self.identities {
            let before = identity.faces.len();
            identity.faces.retain(|f| f.id != id);
            if identity.faces.len() != before {
                identity.updated_at = Utc::now();
                return Ok(());
            }
        }
        let before = self.standalone.len();
        self.standalone.retain(|f| f.id != id);
        if self.standalone.len() == before {
            return Err(StoreError::FaceNotFound(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Embedding;

    fn face(values: Vec<f32>) -> NewFace {
        NewFace::new(Embedding::new(values), vec![1, 2, 3])
    }

    #[tokio::test]
    async fn test_insert_returns_generated_id() {
        let mut store = MemoryStore::new();
        let id = store.insert_identity("Ada").await.unwrap();
        assert!(store.get_identity(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_insert_face_into_identity() {
        let mut store = MemoryStore::new();
        let person = store.insert_identity("Ada").await.unwrap();
        let face_id = store.insert_face(Some(&person), &face(vec![0.1])).await.unwrap();

        let identity = store.get_identity(&person).await.unwrap().unwrap();
        assert_eq!(identity.faces.len(), 1);
        assert_eq!(identity.faces[0].id, face_id);
        assert_eq!(identity.faces[0].identity_id.as_deref(), Some(person.as_str()));
    }

    #[tokio::test]
    async fn test_insert_face_unknown_identity() {
        let mut store = MemoryStore::new();
        let err = store.insert_face(Some("nope"), &face(vec![0.1])).await.unwrap_err();
        assert!(matches!(err, StoreError::IdentityNotFound(_)));
    }

    #[tokio::test]
    async fn test_standalone_faces() {
        let mut store = MemoryStore::new();
        let id = store.insert_face(None, &face(vec![0.5])).await.unwrap();
        let standalone = store.list_standalone_faces().await.unwrap();
        assert_eq!(standalone.len(), 1);
        assert_eq!(standalone[0].id, id);
        assert!(standalone[0].identity_id.is_none());
    }

    #[tokio::test]
    async fn test_delete_identity_cascades() {
        let mut store = MemoryStore::new();
        let person = store.insert_identity("Ada").await.unwrap();
        store.insert_face(Some(&person), &face(vec![0.1])).await.unwrap();
        store.delete_identity(&person).await.unwrap();

        assert!(store.get_identity(&person).await.unwrap().is_none());
        assert!(store.list_identities().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_face_from_identity() {
        let mut store = MemoryStore::new();
        let person = store.insert_identity("Ada").await.unwrap();
        let face_id = store.insert_face(Some(&person), &face(vec![0.1])).await.unwrap();
        store.delete_face(&face_id).await.unwrap();

        let identity = store.get_identity(&person).await.unwrap().unwrap();
        assert!(identity.faces.is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_face() {
        let mut store = MemoryStore::new();
        let err = store.delete_face("nope").await.unwrap_err();
        assert!(matches!(err, StoreError::FaceNotFound(_)));
    }

    #[tokio::test]
    async fn test_update_identity_partial() {
        let mut store = MemoryStore::new();
        let person = store.insert_identity("Ada").await.unwrap();
        store
            .update_identity(&person, None, Some("colleague"), Some(false))
            .await
            .unwrap();

        let identity = store.get_identity(&person).await.unwrap().unwrap();
        assert_eq!(identity.name, "Ada");
        assert_eq!(identity.notes.as_deref(), Some("colleague"));
        assert_eq!(identity.notify, Some(false));
    }
}
