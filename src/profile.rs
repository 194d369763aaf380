//! User profile lookup
//!
//! Profiles live in one of several historical collections and with
//! inconsistent field names; the lookup tolerates all of them and falls
//! back to an empty profile rather than failing the turn.

use crate::datastore::DocumentStore;
use crate::models::UserProfile;
use crate::Result;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

// Probed in this order
const CANDIDATE_COLLECTIONS: &[&str] = &["user", "users", "profiles"];

pub struct ProfileRepository {
    store: Arc<dyn DocumentStore>,
}

impl ProfileRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, user_id: &str) -> Result<UserProfile> {
        let id = user_id.trim();

        for collection in CANDIDATE_COLLECTIONS {
            if let Some(doc) = self.store.get_document(collection, id).await? {
                return Ok(profile_from_doc(&doc, id));
            }
        }

        warn!(user_id = id, "No profile found in any candidate collection");
        Ok(UserProfile::empty(id))
    }
}

fn profile_from_doc(doc: &Value, user_id: &str) -> UserProfile {
    let name = string_field(doc, "display_name")
        .or_else(|| string_field(doc, "displayName"))
        .or_else(|| string_field(doc, "name"));

    // "languga" survives from a legacy typo in stored profiles
    let language = string_field(doc, "language").or_else(|| string_field(doc, "languga"));

    UserProfile {
        user_id: user_id.to_string(),
        name,
        language,
        email: string_field(doc, "email"),
    }
}

fn string_field(doc: &Value, field: &str) -> Option<String> {
    doc.get(field)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::InMemoryDocumentStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_field_name_tolerance() {
        let store = Arc::new(InMemoryDocumentStore::new());
        store
            .insert(
                "users",
                "u1",
                json!({"displayName": "Seba", "languga": "es"}),
            )
            .await;

        let repo = ProfileRepository::new(store);
        let profile = repo.get("u1").await.unwrap();
        assert_eq!(profile.display_name(), "Seba");
        assert_eq!(profile.lang(), "es");
    }

    #[tokio::test]
    async fn test_missing_profile_defaults() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let repo = ProfileRepository::new(store);

        let profile = repo.get("nobody").await.unwrap();
        assert_eq!(profile.display_name(), "Usuario");
        assert_eq!(profile.lang(), "es");
        assert!(profile.email.is_none());
    }

    #[tokio::test]
    async fn test_collection_probe_order() {
        let store = Arc::new(InMemoryDocumentStore::new());
        store
            .insert("user", "u1", json!({"display_name": "Primero"}))
            .await;
        store
            .insert("users", "u1", json!({"display_name": "Segundo"}))
            .await;

        let repo = ProfileRepository::new(store);
        let profile = repo.get("u1").await.unwrap();
        assert_eq!(profile.display_name(), "Primero");
    }
}
