pub mod chat_service;

pub use chat_service::{ChatService, CreatedSession, EMPTY_MESSAGE_REPLY};
