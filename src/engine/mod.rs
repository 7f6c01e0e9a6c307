// src/engine/mod.rs

//! # 引擎模块
//!
//! `engine` 模块负责命令分发：
//! - 从网络层接收已解码的请求（命令名 + 参数）
//! - 按命令名（大小写不敏感）查表找到处理函数
//! - 处理函数读写 `Store` / 读取 `Config`，返回一个 `Reply`
//!
//! 未知命令、参数错误一律返回错误回复，不会中断连接。
pub mod server;
pub mod string;
pub mod sync;

use std::sync::Arc;

use bytes::Bytes;

use crate::config::Config;
use crate::protocol::Reply;
use crate::store::Store;

/// 处理函数可见的上下文
pub struct Context<'a> {
    pub store: &'a Store,
    pub config: &'a Config,
}

/// 参数不含命令名本身
pub type Handler = fn(&Context<'_>, &[Bytes]) -> Reply;

/// 命令名 -> 处理函数
static COMMANDS: &[(&str, Handler)] = &[
    ("PING", server::ping),
    ("ECHO", server::echo),
    ("SET", string::set),
    ("GET", string::get),
    ("KEYS", string::keys),
    ("CONFIG", server::config),
    ("INFO", server::info),
    ("REPLCONF", sync::replconf),
    ("PSYNC", sync::psync),
];

/// 按命令名查找处理函数
pub fn lookup(name: &[u8]) -> Option<Handler> {
    COMMANDS
        .iter()
        .find(|(cmd, _)| cmd.as_bytes().eq_ignore_ascii_case(name))
        .map(|(_, handler)| *handler)
}

/// 命令分发器，启动时构造一次，由各连接共享
#[derive(Debug, Clone)]
pub struct Engine {
    store: Arc<Store>,
    config: Arc<Config>,
}

impl Engine {
    pub fn new(store: Arc<Store>, config: Arc<Config>) -> Self {
        Engine { store, config }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 执行单个客户端请求，恰好产生一个回复
    pub fn execute(&self, request: &[Bytes]) -> Reply {
        // 空请求不进入命令逻辑
        let Some((name, args)) = request.split_first() else {
            return Reply::error("ERR empty command");
        };

        let ctx = Context { store: &self.store, config: &self.config };
        match lookup(name) {
            Some(handler) => handler(&ctx, args),
            None => Reply::error(format!(
                "ERR unknown command '{}'",
                String::from_utf8_lossy(name)
            )),
        }
    }
}

/// 统一的参数个数错误
pub(crate) fn wrong_arity(cmd: &str) -> Reply {
    Reply::error(format!("ERR wrong number of arguments for '{}' command", cmd))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub fn engine_with(config: Config) -> Engine {
        Engine::new(Arc::new(Store::new()), Arc::new(config))
    }

    pub fn run(engine: &Engine, parts: &[&str]) -> Vec<u8> {
        let request: Vec<Bytes> = parts.iter().map(|s| Bytes::copy_from_slice(s.as_bytes())).collect();
        engine.execute(&request).encode().to_vec()
    }
}
