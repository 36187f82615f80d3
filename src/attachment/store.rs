// src/attachment/store.rs
// Repository seam for per-user attachment profiles. The learner only ever
// talks to this trait; production can back it with any KV store.

use crate::attachment::AttachmentProfile;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<AttachmentProfile>>;
    async fn set(&self, profile: AttachmentProfile) -> Result<()>;
    /// Explicit reset — the only way a profile is ever removed.
    async fn delete(&self, user_id: &str) -> Result<()>;
}

/// Default in-process store.
pub struct InMemoryProfileStore {
    profiles: Mutex<HashMap<String, AttachmentProfile>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self {
            profiles: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get(&self, user_id: &str) -> Result<Option<AttachmentProfile>> {
        Ok(self.profiles.lock().await.get(user_id).cloned())
    }

    async fn set(&self, profile: AttachmentProfile) -> Result<()> {
        self.profiles
            .lock()
            .await
            .insert(profile.user_id.clone(), profile);
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<()> {
        self.profiles.lock().await.remove(user_id);
        Ok(())
    }
}
