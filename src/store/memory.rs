use async_trait::async_trait;
use tokio::sync::RwLock;

use super::UserStore;
use crate::context::RequestContext;
use crate::error::{StoreError, StoreResult};
use crate::users::model::User;

/// In-process store for tests and local runs without Postgres.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<Vec<User>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, ctx: &RequestContext, user: &User) -> StoreResult<()> {
        let mut users = ctx.run(async { Ok(self.users.write().await) }).await?;
        // The push below is the commit point.
        ctx.check()?;
        // Same guarantee as the primary key on users.id.
        if users.iter().any(|u| u.id == user.id) {
            return Err(StoreError::Persistence(sqlx::Error::Protocol(format!(
                "duplicate key value violates unique constraint on users.id: {}",
                user.id
            ))));
        }
        users.push(user.clone());
        Ok(())
    }

    async fn list_users(&self, ctx: &RequestContext) -> StoreResult<Vec<User>> {
        ctx.run(async { Ok(self.users.read().await.clone()) }).await
    }
}
