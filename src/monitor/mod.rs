// src/monitor/mod.rs
//! 连接登记与 INFO 输出
mod client;
pub mod info;

use std::net::SocketAddr;
use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
use std::time::Instant;
use dashmap::DashMap;

pub use client::ClientTracker;

/// 客户端信息
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub addr: SocketAddr,
    pub connect_time: Instant,
}
