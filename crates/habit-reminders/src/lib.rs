pub mod dispatcher;
pub mod telegram;

use std::future::Future;

pub use telegram::{NotifyError, TelegramNotifier};

/// Outbound text delivery to a user's chat.
pub trait Notifier: Send + Sync + 'static {
    fn send(&self, chat_id: &str, text: &str) -> impl Future<Output = Result<(), NotifyError>> + Send;
}
