use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored habit as returned to API clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Habit {
    pub id: Uuid,
    /// Owner of the habit.
    pub user: Uuid,
    pub location: String,
    #[serde(with = "crate::time_of_day")]
    pub time: NaiveTime,
    pub action: String,
    pub is_pleasant: bool,
    pub related_habit: Option<Uuid>,
    pub periodicity: u32,
    pub reward: Option<String>,
    /// Seconds.
    pub duration: u32,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

impl Habit {
    /// The writable field set of this habit, used as the base for a partial update.
    pub fn to_draft(&self) -> HabitDraft {
        HabitDraft {
            location: self.location.clone(),
            time: self.time,
            action: self.action.clone(),
            is_pleasant: self.is_pleasant,
            related_habit: self.related_habit,
            periodicity: Some(self.periodicity),
            reward: self.reward.clone(),
            duration: self.duration,
            is_public: self.is_public,
        }
    }
}

/// Candidate field set for a create or update, before the validation rules run.
///
/// `periodicity` stays optional here so an explicit `null` from a client
/// reaches the rule set and gets rejected there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HabitDraft {
    pub location: String,
    pub time: NaiveTime,
    pub action: String,
    pub is_pleasant: bool,
    pub related_habit: Option<Uuid>,
    pub periodicity: Option<u32>,
    pub reward: Option<String>,
    pub duration: u32,
    pub is_public: bool,
}

impl HabitDraft {
    /// Reward text if one is set; an empty string counts as no reward.
    pub fn reward(&self) -> Option<&str> {
        self.reward.as_deref().filter(|r| !r.is_empty())
    }
}

/// Full profile, only ever shown to the user it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub avatar: Option<String>,
    pub tg_chat_id: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// The subset of a profile other users are allowed to see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub avatar: Option<String>,
}

impl From<UserProfile> for PublicUser {
    fn from(user: UserProfile) -> Self {
        Self {
            id: user.id,
            email: user.email,
            phone: user.phone,
            city: user.city,
            avatar: user.avatar,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum UserView {
    Full(UserProfile),
    Public(PublicUser),
}

impl UserView {
    /// Full detail for the caller's own profile, public fields otherwise.
    pub fn for_viewer(viewer: Uuid, user: UserProfile) -> Self {
        if user.id == viewer {
            Self::Full(user)
        } else {
            Self::Public(user.into())
        }
    }
}

/// One reminder due at a given minute: what to say and where to send it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueHabit {
    pub habit_id: Uuid,
    pub action: String,
    pub chat_id: Option<String>,
}
