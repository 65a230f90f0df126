use crate::config::Config;
use domain::{ChatError, ChatResult, InferenceEngine};
use shared::telemetry::Telemetry;
use shared::utils::preview;
use std::io;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command};

/// Runs `<binary> run <model>` once per prompt, feeding the prompt on stdin
/// and returning the trimmed stdout.
///
/// The child is killed when the call is dropped or times out.
#[derive(Debug, Clone)]
pub struct OllamaRunner {
    binary: String,
    model: String,
    timeout: Option<Duration>,
    retries: u32,
}

impl OllamaRunner {
    pub fn new(binary: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            model: model.into(),
            timeout: None,
            retries: 0,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.inference_bin, &config.model)
            .with_timeout(config.timeout)
            .with_retries(config.retries)
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn run_once(&self, prompt: &str) -> ChatResult<String> {
        let mut child = Command::new(&self.binary)
            .arg("run")
            .arg(&self.model)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ChatError::Invocation(format!("failed to start {}: {e}", self.binary)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ChatError::Invocation("child stdin was not captured".to_string()))?;

        // Feed stdin while draining stdout so a chatty child cannot block on a full pipe.
        let exchange = async move {
            let (written, output) = tokio::join!(feed(stdin, prompt), child.wait_with_output());
            if let Err(e) = written {
                tracing::debug!(error = %e, "inference process closed stdin early");
            }
            output
        };

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .map_err(|_| ChatError::InvocationTimeout(limit))?,
            None => exchange.await,
        }
        .map_err(|e| ChatError::Invocation(format!("failed waiting for {}: {e}", self.binary)))?;

        self.interpret(output)
    }

    fn interpret(&self, output: Output) -> ChatResult<String> {
        let reply = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if output.status.success() {
            return Ok(reply);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if reply.is_empty() {
            return Err(ChatError::Invocation(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                preview(stderr.trim(), 200)
            )));
        }
        tracing::warn!(
            status = %output.status,
            stderr = %preview(stderr.trim(), 200),
            "inference process failed after producing output; keeping the output"
        );
        Ok(reply)
    }
}

async fn feed(mut stdin: ChildStdin, prompt: &str) -> io::Result<()> {
    stdin.write_all(prompt.as_bytes()).await?;
    stdin.shutdown().await
}

impl InferenceEngine for OllamaRunner {
    async fn generate(&self, prompt: &str) -> ChatResult<String> {
        let telemetry = Telemetry::new();
        let mut attempt = 0;
        loop {
            attempt += 1;
            tracing::debug!(model = %self.model, attempt, prompt = %preview(prompt, 80), "invoking inference process");
            match self.run_once(prompt).await {
                Err(ChatError::Invocation(reason)) if attempt <= self.retries => {
                    tracing::warn!(attempt, %reason, "inference invocation failed, retrying");
                }
                Ok(reply) => {
                    tracing::info!(
                        model = %self.model,
                        elapsed_ms = telemetry.elapsed_ms() as u64,
                        reply_chars = reply.chars().count(),
                        "inference completed"
                    );
                    return Ok(reply);
                }
                Err(e) => {
                    tracing::error!(model = %self.model, error = %e, "inference failed");
                    return Err(e);
                }
            }
        }
    }
}
