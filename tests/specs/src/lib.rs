// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Spawns the real `assistant` binary as a subprocess and talks to it over
//! WebSocket.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

/// Resolve the path to the compiled `assistant` binary.
pub fn assistant_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("assistant")
}

/// Find a free TCP port by binding to :0 then releasing.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// A running `assistant` process that is killed on drop.
pub struct AssistantProcess {
    child: Child,
    port: u16,
    _seed: Option<tempfile::NamedTempFile>,
}

/// Builder for the flags an [`AssistantProcess`] starts with.
#[derive(Default)]
pub struct AssistantBuilder {
    seed: Option<String>,
    args: Vec<String>,
}

impl AssistantBuilder {
    /// Load `json` as the store seed (`--seed`).
    pub fn seed(mut self, json: &str) -> Self {
        self.seed = Some(json.to_owned());
        self
    }

    /// Pass an extra flag through to the binary.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn spawn(self) -> anyhow::Result<AssistantProcess> {
        let binary = assistant_binary();
        anyhow::ensure!(binary.exists(), "assistant binary not found at {}", binary.display());

        let port = free_port()?;
        let mut args: Vec<String> = vec![
            "--host".into(),
            "127.0.0.1".into(),
            "--port".into(),
            port.to_string(),
            "--log-format".into(),
            "text".into(),
            "--log-level".into(),
            "warn".into(),
        ];

        let seed = match self.seed {
            Some(json) => {
                let mut file = tempfile::NamedTempFile::new()?;
                file.write_all(json.as_bytes())?;
                args.extend(["--seed".into(), file.path().to_string_lossy().into_owned()]);
                Some(file)
            }
            None => None,
        };
        args.extend(self.args);

        let child = Command::new(&binary)
            .args(&args)
            .env_remove("ASSISTANT_WECHAT_APP_ID")
            .env_remove("ASSISTANT_WECHAT_SECRET")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(AssistantProcess { child, port, _seed: seed })
    }
}

impl AssistantProcess {
    pub fn build() -> AssistantBuilder {
        AssistantBuilder::default()
    }

    /// Spawn the binary with `seed` and default flags.
    pub fn start(seed: &str) -> anyhow::Result<Self> {
        Self::build().seed(seed).spawn()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// WebSocket URL of the default route.
    pub fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}/ws", self.port)
    }

    /// Poll the port until it accepts TCP connections.
    pub async fn wait_ready(&self, timeout: Duration) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("assistant did not start listening within {timeout:?}");
            }
            if tokio::net::TcpStream::connect(("127.0.0.1", self.port)).await.is_ok() {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Deliver SIGTERM via the system `kill` utility.
    pub fn terminate(&self) -> anyhow::Result<()> {
        let status = Command::new("kill").args(["-TERM", &self.child.id().to_string()]).status()?;
        anyhow::ensure!(status.success(), "kill -TERM failed: {status}");
        Ok(())
    }

    /// Wait for the process to exit within `timeout`.
    pub async fn wait_exit(
        &mut self,
        timeout: Duration,
    ) -> anyhow::Result<std::process::ExitStatus> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("assistant did not exit within {timeout:?}");
            }
            if let Some(status) = self.child.try_wait()? {
                return Ok(status);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

impl Drop for AssistantProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
