// src/lib.rs
//! crab-kv 库：protocol / snapshot / store / engine / replication / server

pub mod config;      // 配置（JSON 文件 + 命令行）
pub mod error;       // 错误类型
pub mod expire;      // 过期时间换算
pub mod protocol;    // RESP 编解码
pub mod snapshot;    // RDB 快照加载
pub mod store;       // 内存 KV 存储
pub mod engine;      // 命令分发
pub mod monitor;     // 连接登记 & INFO
pub mod replication; // 从节点握手
pub mod server;      // 网络层

pub use config::Config;
pub use server::Server;
