use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::info;
use uuid::Uuid;

use habit_db::models::UserFields;
use habit_types::api::{Claims, UserPatch, UserRequest};
use habit_types::models::UserView;

use crate::auth::{AppState, hash_password};
use crate::error::ApiError;
use crate::permissions::{Operation, authorize};
use crate::validators::{UserCandidate, validate_user};
use crate::with_db;

const EMAIL_TAKEN: &str = "A user with this email already exists.";

/// POST /users/: open registration.
pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<UserRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    validate_user(&UserCandidate {
        email: &req.email,
        password: Some(&req.password),
        phone: req.phone.as_deref(),
        city: req.city.as_deref(),
        tg_chat_id: req.tg_chat_id.as_deref(),
    })?;

    let user = with_db(&state, move |db| {
        if db.get_user_by_email(&req.email)?.is_some() {
            return Err(ApiError::Conflict(EMAIL_TAKEN));
        }

        let fields = UserFields {
            password_hash: hash_password(&req.password)?,
            email: req.email,
            phone: req.phone,
            city: req.city,
            avatar: req.avatar,
            tg_chat_id: req.tg_chat_id,
        };
        Ok(db.create_user(Uuid::new_v4(), &fields)?)
    })
    .await?;

    info!("Registered user {}", user.id);
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /users/: everyone, with full detail only for the caller.
pub async fn list_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let users = with_db(&state, |db| Ok(db.list_users()?)).await?;

    let views: Vec<UserView> = users
        .into_iter()
        .map(|user| UserView::for_viewer(claims.sub, user))
        .collect();

    Ok(Json(views))
}

/// GET /users/{id}/
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = claims.sub;
    let user = with_db(&state, move |db| {
        let user = db.get_user(user_id)?.ok_or(ApiError::NotFound)?;
        authorize(actor, &user, Operation::Read).require("You cannot view this profile")?;
        Ok(user)
    })
    .await?;

    Ok(Json(UserView::for_viewer(actor, user)))
}

/// PUT /users/{id}/
pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<UserRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    save_user(state, claims.sub, user_id, req.into()).await
}

/// PATCH /users/{id}/
pub async fn patch_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(patch), _): WithRejection<Json<UserPatch>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    save_user(state, claims.sub, user_id, patch).await
}

async fn save_user(
    state: AppState,
    actor: Uuid,
    user_id: Uuid,
    patch: UserPatch,
) -> Result<Json<UserView>, ApiError> {
    let user = with_db(&state, move |db| {
        let row = db.get_user_row(user_id)?.ok_or(ApiError::NotFound)?;
        let current = db.get_user(user_id)?.ok_or(ApiError::NotFound)?;
        authorize(actor, &current, Operation::Write)
            .require("You cannot edit other user's profile")?;

        let mut fields = UserFields::from(row);
        if let Some(email) = patch.email {
            fields.email = email;
        }
        if let Some(phone) = patch.phone {
            fields.phone = phone;
        }
        if let Some(city) = patch.city {
            fields.city = city;
        }
        if let Some(avatar) = patch.avatar {
            fields.avatar = avatar;
        }
        if let Some(tg_chat_id) = patch.tg_chat_id {
            fields.tg_chat_id = tg_chat_id;
        }

        validate_user(&UserCandidate {
            email: &fields.email,
            password: patch.password.as_deref(),
            phone: fields.phone.as_deref(),
            city: fields.city.as_deref(),
            tg_chat_id: fields.tg_chat_id.as_deref(),
        })?;

        if fields.email != current.email {
            if let Some(other) = db.get_user_by_email(&fields.email)? {
                if other.id != user_id.to_string() {
                    return Err(ApiError::Conflict(EMAIL_TAKEN));
                }
            }
        }
        if let Some(password) = &patch.password {
            fields.password_hash = hash_password(password)?;
        }

        db.update_user(user_id, &fields)?.ok_or(ApiError::NotFound)
    })
    .await?;

    Ok(Json(UserView::Full(user)))
}

/// DELETE /users/{id}/: removes the account and all of its habits.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = claims.sub;
    with_db(&state, move |db| {
        let user = db.get_user(user_id)?.ok_or(ApiError::NotFound)?;
        authorize(actor, &user, Operation::Write)
            .require("You cannot delete other user's profile")?;
        db.delete_user(user_id)?;
        Ok(())
    })
    .await?;

    info!("Deleted user {}", user_id);
    Ok(StatusCode::NO_CONTENT)
}
