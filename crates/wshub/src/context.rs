// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-connection key-value store for session state attached after the
//! handshake (for example the authenticated user id).

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// A value held in a [`ContextStore`].
#[derive(Clone)]
pub enum ContextValue {
    Str(String),
    Int(i64),
    Bool(bool),
    Other(Arc<dyn Any + Send + Sync>),
}

impl ContextValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Int(_) => "int",
            Self::Bool(_) => "bool",
            Self::Other(_) => "other",
        }
    }
}

impl fmt::Debug for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Self::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Other(_) => f.write_str("Other(..)"),
        }
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<i64> for ContextValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for ContextValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Why a typed lookup produced no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    Missing,
    TypeMismatch { expected: &'static str, found: &'static str },
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("context key not set"),
            Self::TypeMismatch { expected, found } => {
                write!(f, "context value is {found}, expected {expected}")
            }
        }
    }
}

impl std::error::Error for ContextError {}

/// Mutex-guarded map; read from the read task and written from handlers.
#[derive(Default)]
pub struct ContextStore {
    values: Mutex<HashMap<String, ContextValue>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<ContextValue>) {
        self.values.lock().insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<ContextValue> {
        self.values.lock().get(key).cloned()
    }

    pub fn remove(&self, key: &str) -> Option<ContextValue> {
        self.values.lock().remove(key)
    }

    pub fn get_str(&self, key: &str) -> Result<String, ContextError> {
        match self.get(key) {
            Some(ContextValue::Str(s)) => Ok(s),
            Some(other) => Err(mismatch("string", &other)),
            None => Err(ContextError::Missing),
        }
    }

    pub fn get_int(&self, key: &str) -> Result<i64, ContextError> {
        match self.get(key) {
            Some(ContextValue::Int(i)) => Ok(i),
            Some(other) => Err(mismatch("int", &other)),
            None => Err(ContextError::Missing),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, ContextError> {
        match self.get(key) {
            Some(ContextValue::Bool(b)) => Ok(b),
            Some(other) => Err(mismatch("bool", &other)),
            None => Err(ContextError::Missing),
        }
    }
}

fn mismatch(expected: &'static str, found: &ContextValue) -> ContextError {
    ContextError::TypeMismatch { expected, found: found.type_name() }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
