pub mod error;
pub mod inference;
pub mod session;

pub use error::{ChatError, ChatResult};
pub use inference::InferenceEngine;
pub use session::{Session, SessionId, Speaker, Turn};
