pub mod email;
pub mod format;
pub mod ical;
pub mod telegram;

pub use email::{email_sender_from_config, Attachment, EmailSender, ResendSender, SendGridSender};
pub use telegram::{TelegramNotifier, TelegramSender};
