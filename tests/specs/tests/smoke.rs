// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that spawn the real `assistant` binary.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use prost::Message;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use assistant::proto::{BaseResponse, LoginResponse, ProtocolType, RespCode};
use assistant::test_support::login_request;
use assistant_specs::AssistantProcess;

const TIMEOUT: Duration = Duration::from_secs(10);

const SEED: &str = r#"{
    "labs": [{"_id": "lab-1", "name": "Main", "is_default": true}],
    "roles": [{"_id": "role-1", "lab_id": "lab-1", "name": "学生"}]
}"#;

async fn next_response<S>(rx: &mut S) -> anyhow::Result<BaseResponse>
where
    S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let msg = tokio::time::timeout(TIMEOUT, rx.next())
            .await
            .map_err(|_| anyhow::anyhow!("ws recv timeout"))?
            .ok_or_else(|| anyhow::anyhow!("ws stream closed"))??;
        match msg {
            WsMessage::Binary(data) => return Ok(BaseResponse::decode(data)?),
            WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
            other => anyhow::bail!("expected Binary message, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn websocket_login() -> anyhow::Result<()> {
    let assistant = AssistantProcess::start(SEED)?;
    assistant.wait_ready(TIMEOUT).await?;

    let (ws, _) = tokio_tungstenite::connect_async(assistant.ws_url()).await?;
    let (mut tx, mut rx) = ws.split();

    tx.send(WsMessage::Binary(login_request("smoke").into())).await?;
    let resp = next_response(&mut rx).await?;

    assert_eq!(resp.r#type, ProtocolType::LoginResp as i32);
    assert_eq!(resp.result, RespCode::Success as i32);
    let body = LoginResponse::decode(resp.data)?;
    assert_eq!(body.user.map(|u| u.open_id).as_deref(), Some("mock_openid_smoke"));
    assert_eq!(body.lab_info.map(|l| l.user_role_id).as_deref(), Some("role-1"));
    Ok(())
}

#[tokio::test]
async fn login_without_labs_reports_error() -> anyhow::Result<()> {
    let assistant = AssistantProcess::build().spawn()?;
    assistant.wait_ready(TIMEOUT).await?;

    let (ws, _) = tokio_tungstenite::connect_async(assistant.ws_url()).await?;
    let (mut tx, mut rx) = ws.split();

    tx.send(WsMessage::Binary(login_request("smoke").into())).await?;
    let resp = next_response(&mut rx).await?;
    assert_eq!(resp.r#type, ProtocolType::LoginReq as i32);
    assert_eq!(resp.result, RespCode::Error as i32);
    assert!(resp.msg.contains("failed to get default lab"), "msg: {}", resp.msg);
    Ok(())
}

#[tokio::test]
async fn custom_route() -> anyhow::Result<()> {
    let assistant = AssistantProcess::build().seed(SEED).arg("--route").arg("/socket").spawn()?;
    assistant.wait_ready(TIMEOUT).await?;

    let url = format!("ws://127.0.0.1:{}/socket", assistant.port());
    let (ws, _) = tokio_tungstenite::connect_async(url).await?;
    let (mut tx, mut rx) = ws.split();
    tx.send(WsMessage::Binary(login_request("r").into())).await?;
    assert_eq!(next_response(&mut rx).await?.result, RespCode::Success as i32);

    assert!(tokio_tungstenite::connect_async(assistant.ws_url()).await.is_err());
    Ok(())
}

#[tokio::test]
async fn sigterm_exits_cleanly() -> anyhow::Result<()> {
    let mut assistant = AssistantProcess::start(SEED)?;
    assistant.wait_ready(TIMEOUT).await?;

    assistant.terminate()?;
    let status = assistant.wait_exit(TIMEOUT).await?;
    assert!(status.success(), "exit status: {status}");
    Ok(())
}

#[tokio::test]
async fn invalid_flags_exit_with_code_two() -> anyhow::Result<()> {
    let mut assistant = AssistantProcess::build().arg("--route").arg("no-slash").spawn()?;
    let status = assistant.wait_exit(TIMEOUT).await?;
    assert_eq!(status.code(), Some(2));
    Ok(())
}

#[tokio::test]
async fn unreadable_seed_is_fatal() -> anyhow::Result<()> {
    let mut assistant = AssistantProcess::build().seed("not json").spawn()?;
    let status = assistant.wait_exit(TIMEOUT).await?;
    assert_eq!(status.code(), Some(1));
    Ok(())
}
