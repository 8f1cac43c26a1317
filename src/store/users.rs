use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repository::StoreError;

// ============================================================================
// User Directory - identity collaborator
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub display_name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserProfile>, StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<Uuid, UserProfile>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, profile: UserProfile) {
        self.users.write().await.insert(profile.id, profile);
    }

    /// Register a user and return their id
    pub async fn add(&self, display_name: &str, email: &str) -> Uuid {
        let id = Uuid::now_v7();
        self.insert(UserProfile {
            id,
            display_name: display_name.to_string(),
            email: email.to_string(),
            phone: None,
        })
        .await;
        id
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.users.read().await.get(&user_id).cloned())
    }
}
