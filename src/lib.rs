pub mod app;
pub mod config;
pub mod context;
pub mod error;
pub mod state;
pub mod store;
pub mod users;

pub use context::RequestContext;
pub use error::{ErrorKind, StoreError, StoreResult};
pub use store::{initialize_store, MemoryStore, PgStore, UserStore};
pub use users::{create_user, list_users, NewUser, User};
