use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::info;
use uuid::Uuid;

use habit_db::HabitStore;
use habit_types::api::{Claims, HabitPatch, HabitRequest, PageQuery};
use habit_types::models::{Habit, HabitDraft};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::pagination::paginate;
use crate::permissions::{Decision, Operation, authorize};
use crate::validators::{validate_habit, validate_habit_update};
use crate::with_db;

/// GET /habits/: the caller's habits plus every public one, paginated.
pub async fn list_habits(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = claims.sub;
    let habits = with_db(&state, move |db| Ok(db.list_visible(actor)?)).await?;
    Ok(Json(paginate(habits, &query, "/habits/")?))
}

/// POST /habits/: the new habit is always owned by the caller.
pub async fn create_habit(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<HabitRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = claims.sub;
    let draft = req.into_draft();

    let habit = with_db(&state, move |db| {
        let related = resolve_related(db, actor, &draft)?;
        validate_habit(&draft, related.as_ref())?;
        Ok(db.create(actor, &draft)?)
    })
    .await?;

    info!("User {} created habit {}", actor, habit.id);
    Ok((StatusCode::CREATED, Json(habit)))
}

/// GET /habits/{id}/
pub async fn get_habit(
    State(state): State<AppState>,
    Path(habit_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = claims.sub;
    let habit = with_db(&state, move |db| {
        let habit = db.get(habit_id)?.ok_or(ApiError::NotFound)?;
        authorize(actor, &habit, Operation::Read).require("You cannot view this habit")?;
        Ok(habit)
    })
    .await?;

    Ok(Json(habit))
}

/// PUT /habits/{id}/: replace every writable field.
pub async fn update_habit(
    State(state): State<AppState>,
    Path(habit_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<HabitRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    save_habit(state, claims.sub, habit_id, move |_| req.into_draft()).await
}

/// PATCH /habits/{id}/: merge the given fields over the stored ones.
pub async fn patch_habit(
    State(state): State<AppState>,
    Path(habit_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(patch), _): WithRejection<Json<HabitPatch>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    save_habit(state, claims.sub, habit_id, move |existing| {
        patch.apply(existing.to_draft())
    })
    .await
}

/// DELETE /habits/{id}/: habits linking to this one lose their related habit.
pub async fn delete_habit(
    State(state): State<AppState>,
    Path(habit_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = claims.sub;
    with_db(&state, move |db| {
        let habit = db.get(habit_id)?.ok_or(ApiError::NotFound)?;
        authorize(actor, &habit, Operation::Write)
            .require("You cannot delete other user's habit")?;
        db.delete(habit_id)?;
        Ok(())
    })
    .await?;

    info!("User {} deleted habit {}", actor, habit_id);
    Ok(StatusCode::NO_CONTENT)
}

async fn save_habit<F>(
    state: AppState,
    actor: Uuid,
    habit_id: Uuid,
    build: F,
) -> Result<Json<Habit>, ApiError>
where
    F: FnOnce(&Habit) -> HabitDraft + Send + 'static,
{
    let habit = with_db(&state, move |db| {
        let existing = db.get(habit_id)?.ok_or(ApiError::NotFound)?;
        authorize(actor, &existing, Operation::Write)
            .require("You cannot edit other user's habit")?;

        let draft = build(&existing);
        let related = resolve_related(db, actor, &draft)?;
        let has_dependants = existing.is_pleasant && !draft.is_pleasant && db.has_dependants(habit_id)?;
        validate_habit_update(&existing, &draft, related.as_ref(), has_dependants)?;
        db.update(habit_id, &draft)?.ok_or(ApiError::NotFound)
    })
    .await?;

    Ok(Json(habit))
}

/// The related habit named by `draft`, if the caller may see it.
fn resolve_related<S: HabitStore>(store: &S, actor: Uuid, draft: &HabitDraft) -> Result<Option<Habit>, ApiError> {
    let related = match draft.related_habit {
        Some(id) => store
            .get(id)?
            .filter(|h| authorize(actor, h, Operation::Read) == Decision::Allow),
        None => None,
    };
    Ok(related)
}
