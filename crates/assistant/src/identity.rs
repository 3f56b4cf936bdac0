// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exchange of mini-program login codes for a platform identity.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use anyhow::Context;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, info};

pub const DEFAULT_ENDPOINT: &str = "https://api.weixin.qq.com/sns/jscode2session";

/// Identity returned for a valid login code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentitySession {
    pub open_id: String,
    pub session_key: String,
    pub union_id: Option<String>,
}

pub trait IdentityVerifier: Send + Sync {
    /// One attempt, no retry.
    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<IdentitySession>> + Send + 'a>>;
}

/// Body of a `jscode2session` reply. Errors arrive with HTTP 200 and a
/// non-zero `errcode`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SessionReply {
    openid: String,
    session_key: String,
    unionid: Option<String>,
    errcode: i64,
    errmsg: String,
}

/// Verifier backed by the WeChat `jscode2session` endpoint.
pub struct WechatVerifier {
    app_id: String,
    secret: String,
    endpoint: String,
    client: Client,
}

impl WechatVerifier {
    pub fn new(app_id: String, secret: String, endpoint: Option<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            app_id,
            secret,
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_owned()),
            client,
        })
    }

    async fn exchange(&self, code: &str) -> anyhow::Result<IdentitySession> {
        if code.is_empty() {
            anyhow::bail!("invalid js_code");
        }
        let url = Url::parse_with_params(
            &self.endpoint,
            &[
                ("appid", self.app_id.as_str()),
                ("secret", self.secret.as_str()),
                ("js_code", code),
                ("grant_type", "authorization_code"),
            ],
        )
        .context("invalid jscode2session endpoint")?;

        let resp = self.client.get(url).send().await.context("jscode2session request failed")?;
        let status = resp.status();
        if status != StatusCode::OK {
            anyhow::bail!("jscode2session returned HTTP {status}");
        }
        let reply: SessionReply = resp.json().await.context("malformed jscode2session reply")?;
        if reply.errcode != 0 {
            anyhow::bail!("wechat error {}: {}", reply.errcode, reply.errmsg);
        }
        if reply.openid.is_empty() {
            anyhow::bail!("jscode2session reply carried no openid");
        }
        debug!(open_id = %reply.openid, "code exchanged");
        Ok(IdentitySession {
            open_id: reply.openid,
            session_key: reply.session_key,
            union_id: reply.unionid.filter(|u| !u.is_empty()),
        })
    }
}

impl IdentityVerifier for WechatVerifier {
    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<IdentitySession>> + Send + 'a>> {
        Box::pin(self.exchange(code))
    }
}

/// Offline verifier that accepts any non-empty code.
#[derive(Debug, Default)]
pub struct MockVerifier;

impl IdentityVerifier for MockVerifier {
    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<IdentitySession>> + Send + 'a>> {
        Box::pin(async move {
            if code.is_empty() {
                anyhow::bail!("invalid js_code");
            }
            let session = IdentitySession {
                open_id: format!("mock_openid_{code}"),
                session_key: format!("mock_session_key_{code}"),
                union_id: None,
            };
            info!(open_id = %session.open_id, "validated code with mock verifier");
            Ok(session)
        })
    }
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
