use std::io;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::{Provider, ProviderError, ProviderFuture, TranslationRequest};

/// Exit status the bridge uses when the target language is not installed.
pub const UNSUPPORTED_EXIT_CODE: i32 = 2;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Translates by running a local helper process:
/// `<program> <args..> <source-locale> <target-locale> <text>`.
///
/// The translation is read from stdout.
#[derive(Debug, Clone)]
pub struct CommandProvider {
    program: String,
    args: Vec<String>,
    check_args: Vec<String>,
    timeout: Duration,
}

impl CommandProvider {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            check_args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_check_args(mut self, args: Vec<String>) -> Self {
        self.check_args = args;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, args: Vec<String>) -> Result<Output, ProviderError> {
        let mut command = Command::new(&self.program);
        command.args(&args).kill_on_drop(true);
        match timeout(self.timeout, command.output()).await {
            Err(_) => Err(ProviderError::Timeout(self.timeout)),
            Ok(Err(err)) if err.kind() == io::ErrorKind::NotFound => Err(ProviderError::Failed(
                format!("command not found: {}", self.program),
            )),
            Ok(Err(err)) => Err(ProviderError::Failed(format!(
                "failed to run {}: {}",
                self.program, err
            ))),
            Ok(Ok(output)) => Ok(output),
        }
    }
}

impl Provider for CommandProvider {
    fn name(&self) -> &str {
        &self.program
    }

    fn check_available(&self) -> ProviderFuture<()> {
        let provider = self.clone();
        Box::pin(async move {
            let output = provider.run(provider.check_args.clone()).await?;
            if output.status.success() {
                return Ok(());
            }
            Err(ProviderError::Failed(format!(
                "{} exited with {}: {}",
                provider.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        })
    }

    fn translate(&self, request: TranslationRequest) -> ProviderFuture<String> {
        let provider = self.clone();
        Box::pin(async move {
            let mut args = provider.args.clone();
            args.push(request.source_locale);
            args.push(request.target_locale.clone());
            args.push(request.text);
            let output = provider.run(args).await?;
            classify_output(&request.target_locale, output)
        })
    }
}

fn classify_output(target_locale: &str, output: Output) -> Result<String, ProviderError> {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() {
        if output.status.code() == Some(UNSUPPORTED_EXIT_CODE) || mentions_missing_language(&stderr)
        {
            return Err(ProviderError::UnsupportedLocale {
                locale: target_locale.to_string(),
            });
        }
        return Err(ProviderError::Failed(format!(
            "exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if text.is_empty() {
        return Err(ProviderError::Failed("empty translation output".to_string()));
    }
    debug!("translated into {} ({} bytes)", target_locale, text.len());
    Ok(text)
}

fn mentions_missing_language(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("not installed")
        || lower.contains("unsupported language")
        || lower.contains("language not supported")
        || lower.contains("language pack")
}
