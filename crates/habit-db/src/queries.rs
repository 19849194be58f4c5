use anyhow::Result;
use chrono::{NaiveTime, Timelike};
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::warn;
use uuid::Uuid;

use habit_types::models::{DueHabit, Habit, HabitDraft, UserProfile};
use habit_types::time_of_day::STORAGE_FORMAT;

use crate::Database;
use crate::models::{HabitRow, UserFields, UserRow, now_timestamp};
use crate::store::HabitStore;

const USER_COLUMNS: &str =
    "id, email, password, phone, city, avatar, tg_chat_id, is_active, created_at";

const HABIT_COLUMNS: &str = "id, user_id, location, time, action, is_pleasant, related_habit_id, \
     periodicity, reward, duration, is_public, created_at";

impl Database {
    // -- Users --

    pub fn create_user(&self, id: Uuid, fields: &UserFields) -> Result<UserProfile> {
        let created_at = now_timestamp();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, password, phone, city, avatar, tg_chat_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    id.to_string(),
                    fields.email,
                    fields.password_hash,
                    fields.phone,
                    fields.city,
                    fields.avatar,
                    fields.tg_chat_id,
                    created_at,
                ],
            )?;
            query_user(conn, "id", &id.to_string())?
                .ok_or_else(|| anyhow::anyhow!("User vanished after insert: {}", id))?
                .into_profile()
        })
    }

    /// Raw row including the password hash, for authentication and updates.
    pub fn get_user_row(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", &id.to_string()))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<UserProfile>> {
        self.get_user_row(id)?.map(UserRow::into_profile).transpose()
    }

    /// All users ordered by email.
    pub fn list_users(&self) -> Result<Vec<UserProfile>> {
        let rows = self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {} FROM users ORDER BY email", USER_COLUMNS))?;
            let rows = stmt
                .query_map([], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(UserRow::into_profile).collect()
    }

    pub fn update_user(&self, id: Uuid, fields: &UserFields) -> Result<Option<UserProfile>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET email = ?2, password = ?3, phone = ?4, city = ?5, avatar = ?6, tg_chat_id = ?7
                 WHERE id = ?1",
                rusqlite::params![
                    id.to_string(),
                    fields.email,
                    fields.password_hash,
                    fields.phone,
                    fields.city,
                    fields.avatar,
                    fields.tg_chat_id,
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_user(conn, "id", &id.to_string())?.map(UserRow::into_profile).transpose()
        })
    }

    /// Deletes the user together with all of their habits.
    pub fn delete_user(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM users WHERE id = ?1", [id.to_string()])?;
            Ok(deleted > 0)
        })
    }
}

impl HabitStore for Database {
    fn get(&self, id: Uuid) -> Result<Option<Habit>> {
        self.with_conn(|conn| query_habit(conn, id))
    }

    fn list_by_owner(&self, owner: Uuid) -> Result<Vec<Habit>> {
        self.with_conn(|conn| {
            query_habits(
                conn,
                &format!("SELECT {} FROM habits WHERE user_id = ?1 ORDER BY created_at, id", HABIT_COLUMNS),
                [owner.to_string()],
            )
        })
    }

    fn list_public(&self) -> Result<Vec<Habit>> {
        self.with_conn(|conn| {
            query_habits(
                conn,
                &format!("SELECT {} FROM habits WHERE is_public = 1 ORDER BY created_at, id", HABIT_COLUMNS),
                rusqlite::params![],
            )
        })
    }

    fn create(&self, owner: Uuid, draft: &HabitDraft) -> Result<Habit> {
        let id = Uuid::new_v4();
        let created_at = now_timestamp();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO habits (id, user_id, location, time, action, is_pleasant, related_habit_id,
                                     periodicity, reward, duration, is_public, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                rusqlite::params![
                    id.to_string(),
                    owner.to_string(),
                    draft.location,
                    draft.time.format(STORAGE_FORMAT).to_string(),
                    draft.action,
                    draft.is_pleasant,
                    draft.related_habit.map(|r| r.to_string()),
                    draft.periodicity.unwrap_or(1),
                    draft.reward(),
                    draft.duration,
                    draft.is_public,
                    created_at,
                ],
            )?;
            query_habit(conn, id)?.ok_or_else(|| anyhow::anyhow!("Habit vanished after insert: {}", id))
        })
    }

    fn update(&self, id: Uuid, draft: &HabitDraft) -> Result<Option<Habit>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE habits SET location = ?2, time = ?3, action = ?4, is_pleasant = ?5,
                                   related_habit_id = ?6, periodicity = ?7, reward = ?8,
                                   duration = ?9, is_public = ?10
                 WHERE id = ?1",
                rusqlite::params![
                    id.to_string(),
                    draft.location,
                    draft.time.format(STORAGE_FORMAT).to_string(),
                    draft.action,
                    draft.is_pleasant,
                    draft.related_habit.map(|r| r.to_string()),
                    draft.periodicity.unwrap_or(1),
                    draft.reward(),
                    draft.duration,
                    draft.is_public,
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_habit(conn, id)
        })
    }

    fn delete(&self, id: Uuid) -> Result<bool> {
        // related_habit_id is ON DELETE SET NULL, so dependants are unlinked by SQLite.
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM habits WHERE id = ?1", [id.to_string()])?;
            Ok(deleted > 0)
        })
    }

    fn has_dependants(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM habits WHERE related_habit_id = ?1)",
                [id.to_string()],
                |row| row.get(0),
            )?;
            Ok(found)
        })
    }

    fn list_due(&self, at: NaiveTime) -> Result<Vec<DueHabit>> {
        let minute = format!("{:02}:{:02}", at.hour(), at.minute());
        let rows: Vec<(String, String, Option<String>)> = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT h.id, h.action, u.tg_chat_id
                 FROM habits h
                 JOIN users u ON h.user_id = u.id
                 WHERE substr(h.time, 1, 5) = ?1
                 ORDER BY h.created_at, h.id",
            )?;
            let rows = stmt
                .query_map([&minute], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, action, chat_id)| match id.parse::<Uuid>() {
                Ok(habit_id) => Some(DueHabit { habit_id, action, chat_id }),
                Err(e) => {
                    warn!("Skipping habit with corrupt id '{}': {}", id, e);
                    None
                }
            })
            .collect())
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare(&format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, column))?;
    Ok(stmt.query_row([value], user_from_row).optional()?)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password: row.get(2)?,
        phone: row.get(3)?,
        city: row.get(4)?,
        avatar: row.get(5)?,
        tg_chat_id: row.get(6)?,
        is_active: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn query_habit(conn: &Connection, id: Uuid) -> Result<Option<Habit>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM habits WHERE id = ?1", HABIT_COLUMNS))?;
    stmt.query_row([id.to_string()], habit_from_row)
        .optional()?
        .map(HabitRow::into_habit)
        .transpose()
}

fn query_habits<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<Habit>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, habit_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    // Skip rows that fail to convert rather than failing the whole listing.
    Ok(rows
        .into_iter()
        .filter_map(|row| {
            let id = row.id.clone();
            row.into_habit()
                .map_err(|e| warn!("Skipping corrupt habit '{}': {:#}", id, e))
                .ok()
        })
        .collect())
}

fn habit_from_row(row: &Row<'_>) -> rusqlite::Result<HabitRow> {
    Ok(HabitRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        location: row.get(2)?,
        time: row.get(3)?,
        action: row.get(4)?,
        is_pleasant: row.get(5)?,
        related_habit_id: row.get(6)?,
        periodicity: row.get(7)?,
        reward: row.get(8)?,
        duration: row.get(9)?,
        is_public: row.get(10)?,
        created_at: row.get(11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(db: &Database, email: &str, chat_id: Option<&str>) -> Uuid {
        let id = Uuid::new_v4();
        db.create_user(
            id,
            &UserFields {
                email: email.to_string(),
                password_hash: "hash".to_string(),
                phone: None,
                city: None,
                avatar: None,
                tg_chat_id: chat_id.map(str::to_string),
            },
        )
        .unwrap();
        id
    }

    fn draft(action: &str, time: (u32, u32), is_pleasant: bool) -> HabitDraft {
        HabitDraft {
            location: "Kitchen".to_string(),
            time: NaiveTime::from_hms_opt(time.0, time.1, 0).unwrap(),
            action: action.to_string(),
            is_pleasant,
            related_habit: None,
            periodicity: Some(1),
            reward: None,
            duration: 60,
            is_public: false,
        }
    }

    #[test]
    fn test_create_and_get_habit() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "a@example.com", None);

        let created = db.create(owner, &draft("Drink water", (9, 0), true)).unwrap();
        let fetched = db.get(created.id).unwrap().unwrap();

        assert_eq!(fetched, created);
        assert_eq!(fetched.user, owner);
        assert_eq!(fetched.action, "Drink water");
        assert_eq!(fetched.time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(fetched.periodicity, 1);
        assert!(fetched.is_pleasant);
        assert!(db.get(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_empty_reward_stored_as_null() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "a@example.com", None);
        let mut d = draft("Walk", (7, 0), false);
        d.reward = Some(String::new());

        let habit = db.create(owner, &d).unwrap();
        assert_eq!(habit.reward, None);
    }

    #[test]
    fn test_delete_clears_related_habit() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "a@example.com", None);
        let pleasant = db.create(owner, &draft("Bath", (20, 0), true)).unwrap();

        let mut d = draft("Run", (7, 0), false);
        d.related_habit = Some(pleasant.id);
        let dependant = db.create(owner, &d).unwrap();
        assert_eq!(dependant.related_habit, Some(pleasant.id));
        assert!(db.has_dependants(pleasant.id).unwrap());
        assert!(!db.has_dependants(dependant.id).unwrap());

        assert!(db.delete(pleasant.id).unwrap());
        assert!(!db.delete(pleasant.id).unwrap());

        let dependant = db.get(dependant.id).unwrap().unwrap();
        assert!(!db.has_dependants(pleasant.id).unwrap());
        assert_eq!(dependant.related_habit, None);
    }

    #[test]
    fn test_delete_user_removes_their_habits() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "a@example.com", None);
        let habit = db.create(owner, &draft("Run", (7, 0), false)).unwrap();

        assert!(db.delete_user(owner).unwrap());
        assert!(db.get(habit.id).unwrap().is_none());
        assert!(db.get_user(owner).unwrap().is_none());
    }

    #[test]
    fn test_list_visible_merges_own_and_public() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice@example.com", None);
        let bob = user(&db, "bob@example.com", None);

        let own_private = db.create(alice, &draft("Stretch", (6, 0), false)).unwrap();
        let mut public = draft("Meditate", (6, 30), true);
        public.is_public = true;
        let own_public = db.create(alice, &public).unwrap();
        let bobs_public = db.create(bob, &public).unwrap();
        db.create(bob, &draft("Secret", (8, 0), false)).unwrap();

        let ids: Vec<Uuid> = db.list_visible(alice).unwrap().iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![own_private.id, own_public.id, bobs_public.id]);

        let ids: Vec<Uuid> = db.list_visible(bob).unwrap().iter().map(|h| h.id).collect();
        assert_eq!(ids.len(), 3);
        assert!(!ids.contains(&own_private.id));
    }

    #[test]
    fn test_list_due_matches_hour_and_minute() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "a@example.com", Some("tg_chat_id"));
        let due = db.create(owner, &draft("action", (9, 0), true)).unwrap();
        db.create(owner, &draft("later", (9, 1), true)).unwrap();
        db.create(owner, &draft("evening", (21, 0), true)).unwrap();

        let at = NaiveTime::from_hms_opt(9, 0, 42).unwrap();
        let found = db.list_due(at).unwrap();
        assert_eq!(
            found,
            vec![DueHabit {
                habit_id: due.id,
                action: "action".to_string(),
                chat_id: Some("tg_chat_id".to_string()),
            }]
        );
    }

    #[test]
    fn test_users_listed_by_email() {
        let db = Database::open_in_memory().unwrap();
        user(&db, "zed@example.com", None);
        user(&db, "amy@example.com", None);

        let emails: Vec<String> = db.list_users().unwrap().into_iter().map(|u| u.email).collect();
        assert_eq!(emails, vec!["amy@example.com", "zed@example.com"]);
        assert!(db.get_user_by_email("amy@example.com").unwrap().is_some());
        assert!(db.get_user_by_email("nobody@example.com").unwrap().is_none());
    }
}
