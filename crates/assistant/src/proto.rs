// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire schema shared with the mini-program client.
//!
//! Every frame is a `BaseRequest` / `BaseResponse` envelope whose `data`
//! field carries a message specific to the envelope's `type`.

use serde::{Deserialize, Serialize};

/// Envelope message-type tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum ProtocolType {
    Unknown = 0,
    LoginReq = 1,
    LoginResp = 2,
}

impl ProtocolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::LoginReq => "LOGIN_REQ",
            Self::LoginResp => "LOGIN_RESP",
        }
    }
}

/// Result code carried by every response envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum RespCode {
    Success = 0,
    Error = 1,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BaseRequest {
    #[prost(enumeration = "ProtocolType", tag = "1")]
    pub r#type: i32,
    #[prost(bytes = "bytes", tag = "2")]
    pub data: bytes::Bytes,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BaseResponse {
    #[prost(enumeration = "ProtocolType", tag = "1")]
    pub r#type: i32,
    #[prost(enumeration = "RespCode", tag = "2")]
    pub result: i32,
    #[prost(string, tag = "3")]
    pub msg: String,
    #[prost(bytes = "bytes", tag = "4")]
    pub data: bytes::Bytes,
    /// Capture time, seconds since the Unix epoch.
    #[prost(int64, tag = "5")]
    pub timestamp: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LoginRequest {
    /// One-time code issued to the mini-program by `wx.login`.
    #[prost(string, tag = "1")]
    pub js_code: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LoginResponse {
    #[prost(message, optional, tag = "1")]
    pub user: Option<User>,
    #[prost(message, optional, tag = "2")]
    pub lab_info: Option<LoginLabInfo>,
}

// -- Records ----------------------------------------------------------------
//
// These double as stored documents, keyed by `_id`.

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    #[prost(string, tag = "1")]
    #[serde(rename = "_id")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub avatar: String,
    #[prost(string, tag = "4")]
    pub open_id: String,
    #[prost(string, repeated, tag = "5")]
    pub lab_ids: Vec<String>,
    #[prost(int64, tag = "6")]
    pub created_at: i64,
    #[prost(int64, tag = "7")]
    pub updated_at: i64,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Lab {
    #[prost(string, tag = "1")]
    #[serde(rename = "_id")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub description: String,
    #[prost(bool, tag = "4")]
    pub is_default: bool,
    #[prost(int64, tag = "5")]
    pub created_at: i64,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Role {
    #[prost(string, tag = "1")]
    #[serde(rename = "_id")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub lab_id: String,
    #[prost(string, tag = "3")]
    pub name: String,
}

/// The lab a user lands in after login, with the role they act as.
#[derive(Clone, PartialEq, prost::Message)]
pub struct LoginLabInfo {
    #[prost(message, optional, tag = "1")]
    pub lab: Option<Lab>,
    #[prost(message, repeated, tag = "2")]
    pub roles: Vec<Role>,
    #[prost(string, tag = "3")]
    pub user_role_id: String,
    #[prost(message, optional, tag = "4")]
    pub user_role: Option<Role>,
}
