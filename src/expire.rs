// src/expire.rs

//! 过期时间的换算
//!
//! 存储层一律使用单调时钟 `Instant` 作为绝对过期点；
//! 快照文件里的过期时间是 UNIX 毫秒，需要在加载时换算成相对时长。

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// 返回当前的 UNIX 毫秒
pub fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// 根据 TTL 计算单调时钟上的过期点
pub fn deadline_after(ttl: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(ttl).unwrap_or(now + Duration::from_secs(u32::MAX as u64))
}

/// 到期时刻不晚于 now 即视为过期
pub fn is_expired(deadline: Option<Instant>, now: Instant) -> bool {
    matches!(deadline, Some(at) if at <= now)
}

/// 把绝对 UNIX 毫秒换算成「距离 now_ms 还剩多久」，已过期返回 None
pub fn remaining_until(expire_at_ms: u64, now_ms: u64) -> Option<Duration> {
    if expire_at_ms > now_ms {
        Some(Duration::from_millis(expire_at_ms - now_ms))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_until_drops_past_and_present() {
        assert_eq!(remaining_until(1_000, 2_000), None);
        assert_eq!(remaining_until(2_000, 2_000), None);
        assert_eq!(remaining_until(2_500, 2_000), Some(Duration::from_millis(500)));
    }

    #[test]
    fn expiry_is_inclusive() {
        let now = Instant::now();
        assert!(is_expired(Some(now), now));
        assert!(!is_expired(Some(now + Duration::from_millis(5)), now));
        assert!(!is_expired(None, now));
    }
}
