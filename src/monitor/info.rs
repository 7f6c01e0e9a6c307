// src/monitor/info.rs

use crate::config::Config;

/// 主节点对外公布的复制 ID（40 位十六进制）
pub const MASTER_REPLID: &str = "8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb";
pub const MASTER_REPL_OFFSET: u64 = 0;

/// INFO replication 的内容；作为主节点时附带复制 ID 和偏移量
pub fn replication_section(config: &Config) -> String {
    let mut response = String::new();

    if config.is_replica() {
        response.push_str("role:slave\r\n");
    } else {
        response.push_str("role:master\r\n");
        response.push_str(&format!("master_replid:{}\r\n", MASTER_REPLID));
        response.push_str(&format!("master_repl_offset:{}", MASTER_REPL_OFFSET));
    }

    response
}
