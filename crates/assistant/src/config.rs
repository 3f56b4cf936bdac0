// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use wshub::{CloseErrorPolicy, ConnectionConfig, HubConfig};

/// WebSocket backend for the lab assistant mini-program.
#[derive(Debug, Clone, Parser)]
#[command(name = "assistant", version, about)]
pub struct Config {
    /// Host address to bind to.
    #[arg(long, env = "ASSISTANT_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on (0 picks a free port).
    #[arg(long, env = "ASSISTANT_PORT", default_value = "8080")]
    pub port: u16,

    /// Path of the WebSocket upgrade endpoint.
    #[arg(long, env = "ASSISTANT_ROUTE", default_value = "/ws")]
    pub route: String,

    /// Drop a connection after this long without any inbound frame.
    #[arg(long, env = "ASSISTANT_READ_DEADLINE_MS", default_value = "45000")]
    pub read_deadline_ms: u64,

    /// Bound on a single outbound frame write.
    #[arg(long, env = "ASSISTANT_WRITE_DEADLINE_MS", default_value = "10000")]
    pub write_deadline_ms: u64,

    /// Keepalive ping period (0 disables pings).
    #[arg(long, env = "ASSISTANT_KEEPALIVE_MS", default_value = "20000")]
    pub keepalive_ms: u64,

    /// Outbound frames buffered per connection before sends are rejected.
    #[arg(long, env = "ASSISTANT_BUFFER_CAPACITY", default_value = "1024")]
    pub buffer_capacity: usize,

    /// Largest accepted inbound frame, in bytes.
    #[arg(long, env = "ASSISTANT_MAX_FRAME_SIZE")]
    pub max_frame_size: Option<usize>,

    /// Transport read buffer size hint, in bytes.
    #[arg(long, env = "ASSISTANT_READ_BUFFER_SIZE")]
    pub read_buffer_size: Option<usize>,

    /// Transport write buffer size hint, in bytes.
    #[arg(long, env = "ASSISTANT_WRITE_BUFFER_SIZE")]
    pub write_buffer_size: Option<usize>,

    /// Origins allowed to upgrade (comma-separated; empty accepts any).
    #[arg(long, env = "ASSISTANT_ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,

    /// Also report a close after a connection error.
    #[arg(long, env = "ASSISTANT_NOTIFY_CLOSE_ON_ERROR")]
    pub notify_close_on_error: bool,

    /// Log format (json or text).
    #[arg(long, env = "ASSISTANT_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error) or a filter directive.
    #[arg(long, env = "ASSISTANT_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Append logs to this file instead of stderr.
    #[arg(long, env = "ASSISTANT_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// WeChat mini-program app id. Without credentials logins use a mock
    /// verifier.
    #[arg(long, env = "ASSISTANT_WECHAT_APP_ID")]
    pub wechat_app_id: Option<String>,

    #[arg(long, env = "ASSISTANT_WECHAT_SECRET", hide_env_values = true)]
    pub wechat_secret: Option<String>,

    /// Override the `jscode2session` endpoint URL.
    #[arg(long, env = "ASSISTANT_WECHAT_ENDPOINT")]
    pub wechat_endpoint: Option<String>,

    /// JSON file of labs, roles, and users loaded at startup.
    #[arg(long, env = "ASSISTANT_SEED")]
    pub seed: Option<PathBuf>,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.route.starts_with('/') {
            anyhow::bail!("--route must start with '/', got {:?}", self.route);
        }
        if self.wechat_app_id.is_some() != self.wechat_secret.is_some() {
            anyhow::bail!("--wechat-app-id and --wechat-secret must be set together");
        }
        if self.read_deadline_ms == 0 {
            anyhow::bail!("--read-deadline-ms must be greater than zero");
        }
        if self.write_deadline_ms == 0 {
            anyhow::bail!("--write-deadline-ms must be greater than zero");
        }
        if self.buffer_capacity == 0 {
            anyhow::bail!("--buffer-capacity must be greater than zero");
        }
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid log format: {other}"),
        }
        Ok(())
    }

    pub fn read_deadline(&self) -> Duration {
        Duration::from_millis(self.read_deadline_ms)
    }

    pub fn write_deadline(&self) -> Duration {
        Duration::from_millis(self.write_deadline_ms)
    }

    pub fn keepalive(&self) -> Option<Duration> {
        match self.keepalive_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Both halves of the WeChat credential, when configured.
    pub fn wechat_credentials(&self) -> Option<(&str, &str)> {
        Some((self.wechat_app_id.as_deref()?, self.wechat_secret.as_deref()?))
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            capacity: self.buffer_capacity,
            read_deadline: self.read_deadline(),
            write_deadline: self.write_deadline(),
            read_limit: self.max_frame_size,
            keepalive: self.keepalive(),
            close_errors: if self.notify_close_on_error {
                CloseErrorPolicy::NotifyClose
            } else {
                CloseErrorPolicy::SuppressClose
            },
        }
    }

    pub fn hub_config(&self) -> HubConfig {
        let mut hub = HubConfig {
            read_buffer_size: self.read_buffer_size,
            write_buffer_size: self.write_buffer_size,
            max_frame_size: self.max_frame_size,
            connection: self.connection_config(),
            ..HubConfig::default()
        };
        let origins: Vec<String> = self
            .allowed_origins
            .iter()
            .map(|o| o.trim().to_owned())
            .filter(|o| !o.is_empty())
            .collect();
        if !origins.is_empty() {
            hub = hub.allow_origins(origins);
        }
        hub
    }

    /// Build a minimal `Config` for tests (loopback, port 0, short deadlines).
    #[doc(hidden)]
    pub fn test() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            route: "/ws".into(),
            read_deadline_ms: 5_000,
            write_deadline_ms: 1_000,
            keepalive_ms: 0,
            buffer_capacity: 64,
            max_frame_size: None,
            read_buffer_size: None,
            write_buffer_size: None,
            allowed_origins: Vec::new(),
            notify_close_on_error: false,
            log_format: "json".into(),
            log_level: "debug".into(),
            log_file: None,
            wechat_app_id: None,
            wechat_secret: None,
            wechat_endpoint: None,
            seed: None,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
