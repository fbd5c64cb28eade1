use std::collections::BTreeMap;
use std::process::Stdio;

use async_trait::async_trait;
use rollout_core::ActionRef;
use tokio::process::Command;
use tracing::debug;

use crate::invoker::{Invoker, InvokerError};

const DEP_ENV_PREFIX: &str = "DEP_";

/// Invoker that runs each action as a shell command.
///
/// Dependency values are exposed as `DEP_<NAME>` environment variables
/// (name uppercased, non-alphanumerics mapped to `_`; names that fold
/// onto the same variable are rejected). The last non-empty
/// line of stdout is the step value, so deploy scripts may narrate freely
/// as long as they print the resulting address last. Non-zero exit is a
/// non-retryable failure carrying stderr; failing to spawn at all is
/// retryable.
#[derive(Debug, Clone)]
pub struct CommandInvoker {
    shell: String,
}

impl CommandInvoker {
    pub fn new() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }
}

impl Default for CommandInvoker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Invoker for CommandInvoker {
    async fn perform(
        &self,
        action: &ActionRef,
        dependency_values: &BTreeMap<String, String>,
    ) -> std::result::Result<String, InvokerError> {
        let mut command = Command::new(&self.shell);
        command
            .arg("-c")
            .arg(action.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Distinct dependency names can fold onto the same variable
        // ("a-b" and "a_b" both give DEP_A_B); refuse rather than let one
        // value silently shadow the other.
        let mut vars: BTreeMap<String, &str> = BTreeMap::new();
        for (name, value) in dependency_values {
            let var = format!("{DEP_ENV_PREFIX}{}", env_name(name));
            if let Some(prev) = vars.insert(var.clone(), name.as_str()) {
                return Err(InvokerError::fatal(format!(
                    "dependencies '{prev}' and '{name}' both map to {var}; rename one"
                )));
            }
            command.env(var, value);
        }

        debug!(action = %action, deps = dependency_values.len(), "Spawning action");

        let output = command.output().await.map_err(|e| {
            InvokerError::retryable(format!("failed to spawn '{action}': {e}"))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InvokerError::fatal(format!(
                "action exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        match stdout.lines().rev().find(|l| !l.trim().is_empty()) {
            Some(line) => Ok(line.trim().to_string()),
            None => Err(InvokerError::fatal(format!(
                "action '{action}' produced no output to record"
            ))),
        }
    }
}

fn env_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_deps() -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    #[test]
    fn test_env_name() {
        assert_eq!(env_name("factory"), "FACTORY");
        assert_eq!(env_name("dev-wallet.addr"), "DEV_WALLET_ADDR");
    }

    #[tokio::test]
    async fn test_last_line_of_stdout_is_the_value() {
        let invoker = CommandInvoker::new();
        let value = invoker
            .perform(
                &ActionRef::new("echo deploying...; echo 0xABC"),
                &no_deps(),
            )
            .await
            .unwrap();
        assert_eq!(value, "0xABC");
    }

    #[tokio::test]
    async fn test_dependency_env_propagation() {
        let invoker = CommandInvoker::new();
        let mut deps = BTreeMap::new();
        deps.insert("factory".to_string(), "0xFAC".to_string());

        let value = invoker
            .perform(&ActionRef::new("echo \"token-for-$DEP_FACTORY\""), &deps)
            .await
            .unwrap();
        assert_eq!(value, "token-for-0xFAC");
    }

    #[tokio::test]
    async fn test_colliding_dependency_names_rejected() {
        let invoker = CommandInvoker::new();
        let mut deps = BTreeMap::new();
        deps.insert("a-b".to_string(), "1".to_string());
        deps.insert("a_b".to_string(), "2".to_string());

        let err = invoker
            .perform(&ActionRef::new("echo hi"), &deps)
            .await
            .unwrap_err();

        assert!(!err.retryable);
        assert!(err.message.contains("DEP_A_B"));
        assert!(err.message.contains("a-b"));
        assert!(err.message.contains("a_b"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_fatal_with_stderr() {
        let invoker = CommandInvoker::new();
        let err = invoker
            .perform(&ActionRef::new("echo boom >&2; exit 3"), &no_deps())
            .await
            .unwrap_err();

        assert!(!err.retryable);
        assert!(err.message.contains("boom"));
    }

    #[tokio::test]
    async fn test_silent_action_rejected() {
        let invoker = CommandInvoker::new();
        let err = invoker
            .perform(&ActionRef::new("true"), &no_deps())
            .await
            .unwrap_err();

        assert!(err.message.contains("no output"));
    }

    #[tokio::test]
    async fn test_missing_shell_is_retryable() {
        let invoker = CommandInvoker::new().with_shell("/definitely/not/a/shell");
        let err = invoker
            .perform(&ActionRef::new("echo hi"), &no_deps())
            .await
            .unwrap_err();

        assert!(err.retryable);
    }
}
