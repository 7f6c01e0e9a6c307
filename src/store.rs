// src/store.rs

//! 内存 KV 存储
//!
//! - 所有操作在同一把锁内完成，彼此原子
//! - 过期采用惰性删除：读取或枚举时发现过期才删除，没有后台定时清理
//! - 任何操作都不会返回已过期的值

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::expire;

/// 单个 key 对应的值，以及可选的绝对过期点
#[derive(Debug, Clone)]
pub struct StoredValue {
    pub value: Bytes,
    pub expiry: Option<Instant>,
}

#[derive(Debug, Default)]
pub struct Store {
    data: Mutex<HashMap<Bytes, StoredValue>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// 无条件覆盖，并清除原有的过期时间
    pub fn set(&self, key: Bytes, value: Bytes) {
        self.data.lock().insert(key, StoredValue { value, expiry: None });
    }

    /// 覆盖写入，过期点为 now + ttl。
    /// ttl 的合法性由调用方校验。
    pub fn set_with_expiry(&self, key: Bytes, value: Bytes, ttl: Duration) {
        let expiry = Some(expire::deadline_after(ttl));
        self.data.lock().insert(key, StoredValue { value, expiry });
    }

    /// 读取；发现已过期时顺手删除并返回 None
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        let mut data = self.data.lock();
        let entry = data.get(key)?;
        if expire::is_expired(entry.expiry, Instant::now()) {
            data.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    /// 枚举全部存活的 key，同时清掉扫描到的过期 key
    pub fn get_all_keys(&self) -> Vec<Bytes> {
        let now = Instant::now();
        let mut keys = Vec::new();
        self.data.lock().retain(|key, entry| {
            if expire::is_expired(entry.expiry, now) {
                return false;
            }
            keys.push(key.clone());
            true
        });
        keys
    }

    /// 当前条目数（可能包含尚未被惰性删除的过期条目）
    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
