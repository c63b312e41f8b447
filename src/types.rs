pub mod habits;
pub mod notifications;
pub mod push;
