// src/engine/sync.rs

//! 主从同步相关命令：REPLCONF / PSYNC
//!
//! 只实现握手所需的应答，不会真正传输快照。

use bytes::Bytes;

use super::{Context, wrong_arity};
use crate::monitor::info::{MASTER_REPLID, MASTER_REPL_OFFSET};
use crate::protocol::Reply;

/// 参数全部忽略
pub fn replconf(_ctx: &Context<'_>, _args: &[Bytes]) -> Reply {
    Reply::ok()
}

/// PSYNC <replid> <offset> → FULLRESYNC <replid> 0
pub fn psync(_ctx: &Context<'_>, args: &[Bytes]) -> Reply {
    if args.len() != 2 {
        return wrong_arity("psync");
    }
    Reply::Simple(format!("FULLRESYNC {} {}", MASTER_REPLID, MASTER_REPL_OFFSET))
}
