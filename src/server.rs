// src/server.rs
//! 网络层：
//! - 绑定监听端口（失败即退出）
//! - 加载快照（失败只记日志）
//! - 以从节点身份启动时，先与主节点握手（失败即退出）
//! - 接受连接，每次可读时读一个缓冲区、解码一条请求、分发并回复
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::engine::Engine;
use crate::monitor::ClientTracker;
use crate::protocol;
use crate::replication::{self, ReplicationLink};
use crate::snapshot::{self, LoadOutcome};
use crate::store::Store;

/// 单次读取的缓冲区大小；不做跨读取的拼包
pub const READ_BUF_LEN: usize = 4096;

pub struct Server {
    config: Arc<Config>,
    engine: Engine,
    clients: ClientTracker,
}

impl Server {
    /// 构造 Store 与 Engine，各连接共享同一份
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let store = Arc::new(Store::new());
        Server {
            engine: Engine::new(store, Arc::clone(&config)),
            config,
            clients: ClientTracker::new(),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn clients(&self) -> &ClientTracker {
        &self.clients
    }

    /// 默认入口：监听配置的端口
    pub async fn run(self) -> Result<()> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;
        info!(%addr, "listening");

        self.run_with_listener(listener).await
    }

    /// 在已绑定的 listener 上完成启动并进入服务循环
    pub async fn run_with_listener(self, listener: TcpListener) -> Result<()> {
        self.load_snapshot();

        // 握手成功后连接在整个进程生命周期内保持打开
        let _link = self.connect_to_primary().await?;

        self.serve(listener).await
    }

    /// 快照加载失败不影响启动，已加载的部分保留
    pub fn load_snapshot(&self) {
        let path = self.config.snapshot_path();
        match snapshot::load_file(&path, self.engine.store()) {
            Ok(LoadOutcome::Missing) => {}
            Ok(LoadOutcome::Loaded { inserted, expired }) => {
                info!(path = %path.display(), inserted, expired, "snapshot loaded");
            }
            Err(e) => {
                error!(
                    path = %path.display(),
                    error = %e,
                    keys = self.engine.store().len(),
                    "failed to parse snapshot file"
                );
            }
        }
    }

    async fn connect_to_primary(&self) -> Result<Option<ReplicationLink<TcpStream>>> {
        let Some(primary) = &self.config.replicaof else {
            return Ok(None);
        };
        let timeout = self.config.handshake_timeout_ms.map(Duration::from_millis);
        let link = replication::connect_to_primary(primary, self.config.port, timeout)
            .await
            .with_context(|| format!("Handshake with primary {} failed", primary))?;
        Ok(Some(link))
    }

    /// 核心循环: 不断 accept 新连接，并为每个连接 spawn 一个异步任务
    async fn serve(self, listener: TcpListener) -> Result<()> {
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "failed to accept client connection");
                    continue;
                }
            };

            let id = self.clients.add_client(peer);
            info!(id, %peer, connected = self.clients.connected(), "client connected");

            let engine = self.engine.clone();
            let clients = self.clients.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, &engine).await {
                    warn!(id, %peer, error = %e, "client I/O error");
                }
                let age_ms = clients
                    .remove_client(id)
                    .map(|info| info.connect_time.elapsed().as_millis())
                    .unwrap_or_default();
                info!(id, %peer, age_ms, connected = clients.connected(), "client disconnected");
            });
        }
    }
}

/// 单个连接的处理逻辑
/// - 读一次，最多 READ_BUF_LEN 字节
/// - 解码出一条请求；为空则忽略
/// - 分发并写回回复
/// - 读到 0 字节说明客户端断开
pub async fn handle_connection(mut stream: TcpStream, engine: &Engine) -> std::io::Result<()> {
    let mut buf = vec![0u8; READ_BUF_LEN];

    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            // 客户端直接 RST 也算正常断开
            Err(e) if e.kind() == ErrorKind::ConnectionReset => return Ok(()),
            Err(e) => return Err(e),
        };

        let request = protocol::decode_request(&buf[..n]);
        if request.is_empty() {
            debug!(bytes = n, "ignoring undecodable request");
            continue;
        }

        let reply = engine.execute(&request);
        stream.write_all(&reply.encode()).await?;
    }
}
