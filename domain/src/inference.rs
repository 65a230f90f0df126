use crate::error::ChatResult;

/// Boundary to whatever produces assistant replies.
///
/// Implementations return the trimmed reply text. An empty string means the
/// engine ran but had nothing to say, which callers must not treat as a
/// failure.
pub trait InferenceEngine: Send + Sync {
    fn generate(&self, prompt: &str) -> impl std::future::Future<Output = ChatResult<String>> + Send;
}
