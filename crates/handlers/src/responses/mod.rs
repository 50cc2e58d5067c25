//! Built-in response handlers.

mod notification;

pub use notification::Notification;
