//! Database row types. These map directly to SQLite rows and are converted
//! into `habit-types` records at the crate boundary.

use std::sync::atomic::{AtomicI64, Ordering};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveTime, Utc};
use uuid::Uuid;

use habit_types::models::{Habit, UserProfile};
use habit_types::time_of_day;

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub avatar: Option<String>,
    pub tg_chat_id: Option<String>,
    pub is_active: bool,
    pub created_at: String,
}

impl UserRow {
    pub fn into_profile(self) -> Result<UserProfile> {
        Ok(UserProfile {
            id: parse_id(&self.id)?,
            created_at: parse_timestamp(&self.created_at)?,
            email: self.email,
            phone: self.phone,
            city: self.city,
            avatar: self.avatar,
            tg_chat_id: self.tg_chat_id,
            is_active: self.is_active,
        })
    }
}

/// Column values for inserting or replacing a user.
pub struct UserFields {
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub avatar: Option<String>,
    pub tg_chat_id: Option<String>,
}

impl From<UserRow> for UserFields {
    fn from(row: UserRow) -> Self {
        Self {
            email: row.email,
            password_hash: row.password,
            phone: row.phone,
            city: row.city,
            avatar: row.avatar,
            tg_chat_id: row.tg_chat_id,
        }
    }
}

pub struct HabitRow {
    pub id: String,
    pub user_id: String,
    pub location: String,
    pub time: String,
    pub action: String,
    pub is_pleasant: bool,
    pub related_habit_id: Option<String>,
    pub periodicity: u32,
    pub reward: Option<String>,
    pub duration: u32,
    pub is_public: bool,
    pub created_at: String,
}

impl HabitRow {
    pub fn into_habit(self) -> Result<Habit> {
        let time: NaiveTime = time_of_day::parse(&self.time)
            .with_context(|| format!("corrupt time '{}' on habit '{}'", self.time, self.id))?;
        Ok(Habit {
            id: parse_id(&self.id)?,
            user: parse_id(&self.user_id)?,
            related_habit: self.related_habit_id.as_deref().map(parse_id).transpose()?,
            created_at: parse_timestamp(&self.created_at)?,
            time,
            location: self.location,
            action: self.action,
            is_pleasant: self.is_pleasant,
            periodicity: self.periodicity,
            reward: self.reward,
            duration: self.duration,
            is_public: self.is_public,
        })
    }
}

fn parse_id(raw: &str) -> Result<Uuid> {
    raw.parse().with_context(|| format!("corrupt id '{}'", raw))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("corrupt timestamp '{}'", raw))
}

static LAST_TIMESTAMP_MICROS: AtomicI64 = AtomicI64::new(0);

/// Timestamp written to `created_at` columns. Strictly increasing within the
/// process so rows sorted by this column keep insertion order.
pub(crate) fn now_timestamp() -> String {
    let now = Utc::now().timestamp_micros();
    let prev = LAST_TIMESTAMP_MICROS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
        .unwrap_or(now);
    let micros = now.max(prev + 1);
    DateTime::<Utc>::from_timestamp(micros.div_euclid(1_000_000), (micros.rem_euclid(1_000_000) * 1_000) as u32)
        .unwrap_or_else(Utc::now)
        .to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
