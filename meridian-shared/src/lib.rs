pub mod app_config;
pub mod models;

pub use models::chat::{ChatMessage, ChatRole};
