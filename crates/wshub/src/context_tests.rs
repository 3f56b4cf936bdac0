// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use super::*;

#[test]
fn typed_accessors_return_stored_values() -> anyhow::Result<()> {
    let ctx = ContextStore::new();
    ctx.set("user_id", "u-1");
    ctx.set("visits", 3i64);
    ctx.set("admin", true);

    assert_eq!(ctx.get_str("user_id")?, "u-1");
    assert_eq!(ctx.get_int("visits")?, 3);
    assert!(ctx.get_bool("admin")?);
    Ok(())
}

#[test]
fn missing_and_mismatched_are_distinct() {
    let ctx = ContextStore::new();
    ctx.set("visits", 3i64);

    assert_eq!(ctx.get_str("absent"), Err(ContextError::Missing));
    assert_eq!(
        ctx.get_str("visits"),
        Err(ContextError::TypeMismatch { expected: "string", found: "int" })
    );
    assert_eq!(
        ctx.get_bool("visits"),
        Err(ContextError::TypeMismatch { expected: "bool", found: "int" })
    );
}

#[test]
fn zero_value_contract_via_unwrap_or_default() {
    let ctx = ContextStore::new();
    ctx.set("flag", "yes");

    assert_eq!(ctx.get_str("absent").unwrap_or_default(), "");
    assert_eq!(ctx.get_int("flag").unwrap_or_default(), 0);
    assert!(!ctx.get_bool("flag").unwrap_or_default());
}

#[test]
fn overwrite_and_remove() -> anyhow::Result<()> {
    let ctx = ContextStore::new();
    ctx.set("k", "first");
    ctx.set("k", "second");
    assert_eq!(ctx.get_str("k")?, "second");

    let removed = ctx.remove("k");
    assert!(matches!(removed, Some(ContextValue::Str(ref s)) if s == "second"));
    assert!(ctx.get("k").is_none());
    Ok(())
}

#[test]
fn other_values_round_trip_through_any() {
    #[derive(Debug, PartialEq)]
    struct Profile {
        level: u8,
    }

    let ctx = ContextStore::new();
    ctx.set("profile", ContextValue::Other(Arc::new(Profile { level: 7 })));

    let level = match ctx.get("profile") {
        Some(ContextValue::Other(any)) => any.downcast_ref::<Profile>().map(|p| p.level),
        _ => None,
    };
    assert_eq!(level, Some(7));
    assert_eq!(
        ctx.get_int("profile"),
        Err(ContextError::TypeMismatch { expected: "int", found: "other" })
    );
}

#[test]
fn concurrent_writers_do_not_lose_keys() {
    let ctx = Arc::new(ContextStore::new());
    let handles: Vec<_> = (0..8i64)
        .map(|i| {
            let ctx = Arc::clone(&ctx);
            std::thread::spawn(move || ctx.set(format!("k{i}"), i))
        })
        .collect();
    for h in handles {
        let _ = h.join();
    }
    for i in 0..8i64 {
        assert_eq!(ctx.get_int(&format!("k{i}")), Ok(i));
    }
}
