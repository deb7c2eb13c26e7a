mod memory;
mod postgres;

use async_trait::async_trait;

use crate::context::RequestContext;
use crate::error::StoreResult;
use crate::users::model::User;

pub use memory::MemoryStore;
pub use postgres::{initialize_store, initialize_store_with, PgStore, PoolSettings, MIGRATOR};

/// Persistence operations the user handlers depend on.
///
/// Implementations are shared across concurrent requests and must not need
/// outside locking. A write that returns a cancellation error must leave
/// nothing behind.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, ctx: &RequestContext, user: &User) -> StoreResult<()>;
    async fn list_users(&self, ctx: &RequestContext) -> StoreResult<Vec<User>>;
}
