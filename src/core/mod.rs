pub mod failures;
pub mod models;
pub mod notifications;
pub mod settings;
