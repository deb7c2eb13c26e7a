use tracing::{error, info, instrument};

use super::model::{NewUser, User};
use crate::context::RequestContext;
use crate::error::StoreResult;
use crate::store::UserStore;

/// `createUser`: assigns a fresh id and persists the input verbatim.
#[instrument(skip_all, fields(username = %input.username))]
pub async fn create_user(
    ctx: &RequestContext,
    store: &dyn UserStore,
    input: NewUser,
) -> StoreResult<User> {
    let user = User::from_input(input);

    if let Err(e) = store.insert_user(ctx, &user).await {
        error!(error = %e, user_id = %user.id, "create user failed");
        return Err(e);
    }

    info!(user_id = %user.id, "user created");
    Ok(user)
}

/// `users`: every stored user, in whatever order the store returns them.
#[instrument(skip_all)]
pub async fn list_users(ctx: &RequestContext, store: &dyn UserStore) -> StoreResult<Vec<User>> {
    let users = store.list_users(ctx).await.map_err(|e| {
        error!(error = %e, "list users failed");
        e
    })?;
    info!(count = users.len(), "users listed");
    Ok(users)
}
