use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{info, warn};

use grocha_core::{GrochaError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub sha: String,
    pub date: String,
}

/// Self-management of the running deployment.
#[async_trait]
pub trait Operations: Send + Sync {
    /// Commit currently checked out.
    async fn version(&self) -> Result<VersionInfo>;

    /// Pull the latest sources; returns the pull output followed by the
    /// recent history.
    async fn update(&self) -> Result<String>;

    /// Ask the service manager to restart the bot.
    async fn restart(&self) -> Result<()>;
}

/// `git` in the checkout directory and `systemctl --user` for restarts.
pub struct SystemOperations {
    repo_dir: PathBuf,
    service_name: String,
}

impl SystemOperations {
    pub fn new(repo_dir: impl Into<PathBuf>, service_name: impl Into<String>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            service_name: service_name.into(),
        }
    }

    /// Run a command, returning stdout (and stderr when `merge_stderr`).
    async fn run(&self, program: &str, args: &[&str], merge_stderr: bool) -> Result<String> {
        let output = tokio::process::Command::new(program)
            .args(args)
            .current_dir(&self.repo_dir)
            .output()
            .await
            .map_err(|e| GrochaError::service(program, format!("{} failed: {e}", args.join(" "))))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            warn!(program, ?args, error = %stderr, "command failed");
            if !merge_stderr {
                return Err(GrochaError::service(program, stderr.trim().to_string()));
            }
        }
        let mut text = stdout.trim().to_string();
        if merge_stderr && !stderr.trim().is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(stderr.trim());
        }
        Ok(text)
    }
}

#[async_trait]
impl Operations for SystemOperations {
    async fn version(&self) -> Result<VersionInfo> {
        let sha = self.run("git", &["rev-parse", "HEAD"], false).await?;
        let date = self.run("git", &["log", "-1", "--format=%cd"], false).await?;
        Ok(VersionInfo { sha, date })
    }

    async fn update(&self) -> Result<String> {
        info!(repo = %self.repo_dir.display(), "pulling latest sources");
        let pull = self
            .run("git", &["pull", "--rebase", "--autostash"], true)
            .await?;
        let log = self
            .run(
                "git",
                &["log", "-10", "--pretty=format:%h - %s (%cr) <%an>"],
                true,
            )
            .await?;
        Ok(format!("{pull}\n\n{log}"))
    }

    async fn restart(&self) -> Result<()> {
        info!(service = %self.service_name, "restarting service");
        self.run(
            "systemctl",
            &["--user", "restart", self.service_name.as_str()],
            false,
        )
        .await?;
        Ok(())
    }
}
