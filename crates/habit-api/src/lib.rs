pub mod auth;
pub mod error;
pub mod habits;
pub mod middleware;
pub mod pagination;
pub mod permissions;
pub mod users;
pub mod validators;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tracing::error;

use habit_db::Database;

use crate::auth::AppState;
use crate::error::ApiError;

/// All HTTP routes. Registration and token issue are open, everything else
/// requires a bearer token.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/users/", post(users::register))
        .route("/users/token/", post(auth::obtain_token))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/users/", get(users::list_users))
        .route(
            "/users/{id}/",
            get(users::get_user)
                .put(users::update_user)
                .patch(users::patch_user)
                .delete(users::delete_user),
        )
        .route("/habits/", get(habits::list_habits).post(habits::create_habit))
        .route(
            "/habits/{id}/",
            get(habits::get_habit)
                .put(habits::update_habit)
                .patch(habits::patch_habit)
                .delete(habits::delete_habit),
        )
        .layer(axum_middleware::from_fn_with_state(state.clone(), middleware::require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}

/// Run blocking DB work off the async runtime.
pub(crate) async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let db = state.db.clone();
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("blocking task failed: {}", e))
        })?
}
