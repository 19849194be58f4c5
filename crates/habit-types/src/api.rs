use chrono::NaiveTime;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::models::HabitDraft;

// -- JWT Claims --

/// JWT claims issued by `POST /users/token/` and checked by the auth middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
}

// -- Users --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub tg_chat_id: Option<String>,
}

/// Partial profile update. A field set to `null` clears it, an absent field is left alone.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserPatch {
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub city: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub avatar: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub tg_chat_id: Option<Option<String>>,
}

impl From<UserRequest> for UserPatch {
    /// A full update is a patch that touches every field.
    fn from(req: UserRequest) -> Self {
        Self {
            email: Some(req.email),
            password: Some(req.password),
            phone: Some(req.phone),
            city: Some(req.city),
            avatar: Some(req.avatar),
            tg_chat_id: Some(req.tg_chat_id),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub user_id: Uuid,
    pub access: String,
}

// -- Habits --

fn default_periodicity() -> Option<u32> {
    Some(1)
}

/// Body of `POST /habits/` and `PUT /habits/{id}/`.
///
/// Omitted optional fields fall back to their defaults, so a PUT resets them.
#[derive(Debug, Deserialize)]
pub struct HabitRequest {
    pub location: String,
    #[serde(deserialize_with = "crate::time_of_day::deserialize")]
    pub time: NaiveTime,
    pub action: String,
    pub is_pleasant: bool,
    #[serde(default)]
    pub related_habit: Option<Uuid>,
    #[serde(default = "default_periodicity")]
    pub periodicity: Option<u32>,
    #[serde(default)]
    pub reward: Option<String>,
    pub duration: u32,
    #[serde(default)]
    pub is_public: bool,
}

impl HabitRequest {
    pub fn into_draft(self) -> HabitDraft {
        HabitDraft {
            location: self.location,
            time: self.time,
            action: self.action,
            is_pleasant: self.is_pleasant,
            related_habit: self.related_habit,
            periodicity: self.periodicity,
            reward: self.reward,
            duration: self.duration,
            is_public: self.is_public,
        }
    }
}

/// Body of `PATCH /habits/{id}/`.
#[derive(Debug, Default, Deserialize)]
pub struct HabitPatch {
    pub location: Option<String>,
    #[serde(default, deserialize_with = "crate::time_of_day::option::deserialize")]
    pub time: Option<NaiveTime>,
    pub action: Option<String>,
    pub is_pleasant: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub related_habit: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub periodicity: Option<Option<u32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub reward: Option<Option<String>>,
    pub duration: Option<u32>,
    pub is_public: Option<bool>,
}

impl HabitPatch {
    /// Merge this patch over the stored field set.
    pub fn apply(self, mut draft: HabitDraft) -> HabitDraft {
        if let Some(location) = self.location {
            draft.location = location;
        }
        if let Some(time) = self.time {
            draft.time = time;
        }
        if let Some(action) = self.action {
            draft.action = action;
        }
        if let Some(is_pleasant) = self.is_pleasant {
            draft.is_pleasant = is_pleasant;
        }
        if let Some(related_habit) = self.related_habit {
            draft.related_habit = related_habit;
        }
        if let Some(periodicity) = self.periodicity {
            draft.periodicity = periodicity;
        }
        if let Some(reward) = self.reward {
            draft.reward = reward;
        }
        if let Some(duration) = self.duration {
            draft.duration = duration;
        }
        if let Some(is_public) = self.is_public {
            draft.is_public = is_public;
        }
        draft
    }
}

// -- Pagination --

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
