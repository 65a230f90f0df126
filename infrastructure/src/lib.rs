pub mod atomic_file;
pub mod config;
pub mod json_log;
pub mod ollama_runner;
pub mod session_store;
