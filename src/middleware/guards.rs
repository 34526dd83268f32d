use crate::error::{AppError, AppResult};
use crate::models::PublicUser;
use crate::state::AppState;
use uuid::Uuid;

/// Resolve the authenticated principal to a directory profile.
///
/// A valid token for a user the directory no longer knows is treated as
/// unauthorized, and a deactivated account may not act at all.
pub async fn load_actor(state: &AppState, user_id: Uuid) -> AppResult<PublicUser> {
    let user = state
        .directory
        .get_user(user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;
    if !user.is_active {
        return Err(AppError::Forbidden);
    }
    Ok(user)
}
