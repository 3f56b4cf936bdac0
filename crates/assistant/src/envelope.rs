// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outer request/response envelope codec.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use prost::Message;

use crate::proto::{BaseRequest, BaseResponse, ProtocolType, RespCode};

/// Message text of every successful response.
pub const SUCCESS_MSG: &str = "Success";

/// Decode an inbound frame. Malformed input is an error, never a panic.
pub fn decode_request(raw: &[u8]) -> Result<BaseRequest, prost::DecodeError> {
    BaseRequest::decode(raw)
}

pub fn success(kind: ProtocolType, data: Bytes) -> BaseResponse {
    BaseResponse {
        r#type: kind as i32,
        result: RespCode::Success as i32,
        msg: SUCCESS_MSG.to_owned(),
        data,
        timestamp: now_secs(),
    }
}

/// An error response. `kind` is the raw tag so unregistered tags can be
/// echoed back unchanged.
pub fn error(kind: i32, msg: impl Into<String>) -> BaseResponse {
    BaseResponse {
        r#type: kind,
        result: RespCode::Error as i32,
        msg: msg.into(),
        data: Bytes::new(),
        timestamp: now_secs(),
    }
}

pub fn encode_response(response: &BaseResponse) -> Bytes {
    Bytes::from(response.encode_to_vec())
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
