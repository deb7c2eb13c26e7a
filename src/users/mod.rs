pub mod handlers;
pub mod model;
pub mod service;

use crate::state::AppState;
use axum::Router;

pub use model::{NewUser, Todo, User};
pub use service::{create_user, list_users};

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::user_routes())
}
