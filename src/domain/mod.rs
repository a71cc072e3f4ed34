pub mod announcement;
pub mod announcement_read;
pub mod audience;
pub mod notification;
pub mod scheduled_notification;
pub mod user;
