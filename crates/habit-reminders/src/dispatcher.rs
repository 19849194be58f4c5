//! Minute-granularity reminder scan and fan-out.
//!
//! A tick task scans the store for habits due at the current wall-clock
//! minute and queues one reminder per habit. A delivery task spawns an
//! independent send for each queued reminder. Sends are fire-and-forget:
//! failures are logged and never retried.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveTime, Timelike, Utc};
use futures_util::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use habit_db::HabitStore;

use crate::Notifier;

/// Reminders waiting for a send task. Ticks block once this many are queued.
const QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub habit_id: Uuid,
    /// `None` when the owner never registered a chat; a send is still attempted.
    pub chat_id: Option<String>,
    pub text: String,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
}

pub fn reminder_text(action: &str) -> String {
    format!("Time for your habit: {}", action)
}

/// Every reminder due at `now`'s hour and minute.
pub fn scan<S: HabitStore + ?Sized>(store: &S, now: NaiveTime) -> anyhow::Result<Vec<Reminder>> {
    let due = store.list_due(now)?;
    Ok(due
        .into_iter()
        .map(|habit| Reminder {
            habit_id: habit.habit_id,
            text: reminder_text(&habit.action),
            chat_id: habit.chat_id,
        })
        .collect())
}

/// Send one reminder. Returns whether the transport accepted it.
pub async fn deliver<N: Notifier>(notifier: &N, reminder: &Reminder) -> bool {
    let chat_id = match reminder.chat_id.as_deref() {
        Some(chat_id) => chat_id,
        None => {
            warn!("Owner of habit {} has no chat id registered", reminder.habit_id);
            ""
        }
    };

    match notifier.send(chat_id, &reminder.text).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Reminder for habit {} not delivered: {}", reminder.habit_id, e);
            false
        }
    }
}

/// Scan and send everything due at `now`, waiting for all sends to finish.
pub async fn run_once<S, N>(store: &S, notifier: &N, now: NaiveTime) -> anyhow::Result<DispatchReport>
where
    S: HabitStore + ?Sized,
    N: Notifier,
{
    let reminders = scan(store, now)?;
    let results = join_all(reminders.iter().map(|r| deliver(notifier, r))).await;

    let sent = results.iter().filter(|ok| **ok).count();
    Ok(DispatchReport {
        sent,
        failed: results.len() - sent,
    })
}

/// Start the tick and delivery tasks. The first tick lands on the next
/// minute boundary, later ticks every `period`.
pub fn spawn<S, N>(store: Arc<S>, notifier: Arc<N>, period: Duration) -> JoinHandle<()>
where
    S: HabitStore + Send + Sync + 'static,
    N: Notifier,
{
    let start = Instant::now() + until_next_minute(Utc::now().time());
    spawn_with_clock(store, notifier, start, period, || Utc::now().time())
}

fn spawn_with_clock<S, N, C>(
    store: Arc<S>,
    notifier: Arc<N>,
    start: Instant,
    period: Duration,
    clock: C,
) -> JoinHandle<()>
where
    S: HabitStore + Send + Sync + 'static,
    N: Notifier,
    C: Fn() -> NaiveTime + Send + 'static,
{
    let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
    tokio::spawn(delivery_loop(notifier, rx));
    tokio::spawn(tick_loop(store, tx, start, period, clock))
}

async fn tick_loop<S, C>(
    store: Arc<S>,
    tx: mpsc::Sender<Reminder>,
    start: Instant,
    period: Duration,
    clock: C,
) where
    S: HabitStore + Send + Sync + 'static,
    C: Fn() -> NaiveTime + Send + 'static,
{
    let mut interval = tokio::time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!("Reminder loop started (every {:?})", period);

    loop {
        interval.tick().await;
        let now = clock();

        let scan_store = store.clone();
        let reminders = match tokio::task::spawn_blocking(move || scan(&*scan_store, now)).await {
            Ok(Ok(reminders)) => reminders,
            Ok(Err(e)) => {
                warn!("Reminder scan failed: {:#}", e);
                continue;
            }
            Err(e) => {
                error!("spawn_blocking join error: {}", e);
                continue;
            }
        };

        if !reminders.is_empty() {
            info!("{} reminder(s) due at {:02}:{:02}", reminders.len(), now.hour(), now.minute());
        }
        for reminder in reminders {
            if tx.send(reminder).await.is_err() {
                error!("Reminder delivery task is gone, stopping reminder loop");
                return;
            }
        }
    }
}

async fn delivery_loop<N: Notifier>(notifier: Arc<N>, mut rx: mpsc::Receiver<Reminder>) {
    while let Some(reminder) = rx.recv().await {
        let notifier = notifier.clone();
        tokio::spawn(async move {
            if deliver(&*notifier, &reminder).await {
                debug!("Reminder for habit {} sent", reminder.habit_id);
            }
        });
    }
}

/// Time left until the next `HH:MM:00`.
fn until_next_minute(now: NaiveTime) -> Duration {
    let into_minute = Duration::new(u64::from(now.second()), now.nanosecond() % 1_000_000_000);
    Duration::from_secs(60).saturating_sub(into_minute)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use habit_db::Database;
    use habit_db::models::UserFields;
    use habit_types::models::HabitDraft;

    use crate::NotifyError;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String)>>,
        fail_for: Option<String>,
    }

    impl Notifier for RecordingNotifier {
        async fn send(&self, chat_id: &str, text: &str) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push((chat_id.to_string(), text.to_string()));
            if self.fail_for.as_deref() == Some(chat_id) {
                return Err(NotifyError::Rejected {
                    status: 400,
                    description: "Bad Request: chat not found".to_string(),
                });
            }
            Ok(())
        }
    }

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

    fn habit(db: &Database, owner: Uuid, action: &str, hour: u32, minute: u32) {
        db.create(
            owner,
            &HabitDraft {
                location: "Home".to_string(),
                time: NaiveTime::from_hms_opt(hour, minute, 0).unwrap(),
                action: action.to_string(),
                is_pleasant: true,
                related_habit: None,
                periodicity: Some(1),
                reward: None,
                duration: 60,
                is_public: false,
            },
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_sends_one_message_per_due_habit() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "email@example.com", Some("tg_chat_id"));
        habit(&db, owner, "action", 9, 0);
        habit(&db, owner, "not yet", 9, 1);

        let notifier = RecordingNotifier::default();
        let at = NaiveTime::from_hms_opt(9, 0, 17).unwrap();
        let report = run_once(&db, &notifier, at).await.unwrap();

        assert_eq!(report, DispatchReport { sent: 1, failed: 0 });
        assert_eq!(
            *notifier.sent.lock().unwrap(),
            vec![("tg_chat_id".to_string(), "Time for your habit: action".to_string())]
        );
    }

    #[tokio::test]
    async fn test_failed_send_does_not_stop_others() {
        let db = Database::open_in_memory().unwrap();
        let broken = user(&db, "broken@example.com", Some("bad-chat"));
        let fine = user(&db, "fine@example.com", Some("good-chat"));
        let no_chat = user(&db, "nochat@example.com", None);
        habit(&db, broken, "Stretch", 7, 30);
        habit(&db, fine, "Read", 7, 30);
        habit(&db, no_chat, "Walk", 7, 30);

        let notifier = RecordingNotifier {
            fail_for: Some("bad-chat".to_string()),
            ..Default::default()
        };
        let at = NaiveTime::from_hms_opt(7, 30, 0).unwrap();
        let report = run_once(&db, &notifier, at).await.unwrap();

        assert_eq!(report, DispatchReport { sent: 2, failed: 1 });
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 3);
        assert!(sent.contains(&(String::new(), "Time for your habit: Walk".to_string())));
    }

    #[tokio::test]
    async fn test_nothing_due() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "email@example.com", Some("tg_chat_id"));
        habit(&db, owner, "action", 9, 0);

        let notifier = RecordingNotifier::default();
        let at = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        let report = run_once(&db, &notifier, at).await.unwrap();

        assert_eq!(report, DispatchReport::default());
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_scan_builds_message_text() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "email@example.com", None);
        habit(&db, owner, "Drink water", 21, 45);

        let reminders = scan(&db, NaiveTime::from_hms_opt(21, 45, 59).unwrap()).unwrap();
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].text, "Time for your habit: Drink water");
        assert_eq!(reminders[0].chat_id, None);
    }

    #[test]
    fn test_until_next_minute() {
        let at = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        assert_eq!(until_next_minute(at), Duration::from_secs(60));

        let at = NaiveTime::from_hms_milli_opt(9, 0, 45, 500).unwrap();
        assert_eq!(until_next_minute(at), Duration::from_millis(14_500));
    }

    #[tokio::test]
    async fn test_spawned_loop_delivers_queued_reminders() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let owner = user(&db, "email@example.com", Some("tg_chat_id"));
        habit(&db, owner, "action", 9, 0);

        let notifier = Arc::new(RecordingNotifier::default());
        let handle = spawn_with_clock(
            db.clone(),
            notifier.clone(),
            Instant::now(),
            Duration::from_millis(50),
            || NaiveTime::from_hms_opt(9, 0, 5).unwrap(),
        );

        for _ in 0..200 {
            if !notifier.sent.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();

        let sent = notifier.sent.lock().unwrap();
        assert!(sent.contains(&("tg_chat_id".to_string(), "Time for your habit: action".to_string())));
    }
}
