// src/engine/string.rs

//! String 类型的命令：SET / GET / KEYS
//!
//! - SET key value [PX ms] → "OK"，PX 必须是正整数毫秒
//! - GET key → 值，不存在或已过期返回 Null
//! - KEYS * → 全部存活的 key，同时清理过期 key

use std::time::Duration;

use bytes::Bytes;

use super::{Context, wrong_arity};
use crate::protocol::Reply;

pub fn set(ctx: &Context<'_>, args: &[Bytes]) -> Reply {
    let [key, value, rest @ ..] = args else {
        return wrong_arity("set");
    };

    if let [option, ttl, ..] = rest {
        if option.eq_ignore_ascii_case(b"PX") {
            return match parse_ttl_ms(ttl) {
                Some(ms) => {
                    ctx.store
                        .set_with_expiry(key.clone(), value.clone(), Duration::from_millis(ms));
                    Reply::ok()
                }
                None => Reply::error("ERR invalid expire time in 'set' command"),
            };
        }
    }

    ctx.store.set(key.clone(), value.clone());
    Reply::ok()
}

pub fn get(ctx: &Context<'_>, args: &[Bytes]) -> Reply {
    let Some(key) = args.first() else {
        return wrong_arity("get");
    };
    match ctx.store.get(key) {
        Some(value) => Reply::Bulk(value),
        None => Reply::Null,
    }
}

/// 只支持 `*`
pub fn keys(ctx: &Context<'_>, args: &[Bytes]) -> Reply {
    let Some(pattern) = args.first() else {
        return wrong_arity("keys");
    };
    if &pattern[..] != b"*" {
        return Reply::error("ERR pattern not supported");
    }
    Reply::Array(ctx.store.get_all_keys())
}

/// 非正数或非整数都视为非法
fn parse_ttl_ms(raw: &[u8]) -> Option<u64> {
    let ms: i64 = std::str::from_utf8(raw).ok()?.parse().ok()?;
    u64::try_from(ms).ok().filter(|&ms| ms > 0)
}
