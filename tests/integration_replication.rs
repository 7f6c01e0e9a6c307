// tests/integration_replication.rs

//! 集成测试：以从节点身份启动
//! 1. 启一个假主节点，记录收到的握手命令并按顺序回复
//! 2. 从节点握手成功后才开始服务，INFO 显示 role:slave
//! 3. 主节点回复不符合预期时，从节点启动失败

use std::time::Duration;

use anyhow::Result;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::oneshot,
};

use crab_kv::{
    Config, Server,
    config::ReplicaOf,
    protocol::{self, decode_request},
};

/// 假主节点：每读到一条命令就回复 replies 中的下一项，返回收到的全部命令
async fn fake_primary(replies: Vec<&'static str>) -> Result<(u16, oneshot::Receiver<Vec<Vec<String>>>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let Ok((mut stream, _)) = listener.accept().await else { return };
        let mut seen = Vec::new();
        for reply in replies {
            let mut buf = [0u8; 512];
            let n = match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            let parts: Vec<String> = decode_request(&buf[..n])
                .iter()
                .map(|p| String::from_utf8_lossy(p).into_owned())
                .collect();
            seen.push(parts);
            if stream.write_all(reply.as_bytes()).await.is_err() {
                break;
            }
        }
        let _ = tx.send(seen);
        // 保持连接，模拟主节点一直在线
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    Ok((port, rx))
}

fn replica_config(replica_port: u16, primary_port: u16) -> Config {
    Config {
        // 不存在的目录：以空库启动
        dir: "/nonexistent/crab-kv".into(),
        port: replica_port,
        replicaof: Some(ReplicaOf { host: "127.0.0.1".into(), port: primary_port }),
        handshake_timeout_ms: Some(2_000),
        ..Config::default()
    }
}

#[tokio::test]
async fn test_replica_handshake_then_serve() -> Result<()> {
    let (primary_port, seen_rx) = fake_primary(vec![
        "+PONG\r\n",
        "+OK\r\n",
        "+OK\r\n",
        "+FULLRESYNC 8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb 0\r\n",
    ])
    .await?;

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let server = Server::new(replica_config(addr.port(), primary_port));
    tokio::spawn(async move {
        let _ = server.run_with_listener(listener).await;
    });

    // 1) 主节点按顺序收到四条握手命令
    let seen = tokio::time::timeout(Duration::from_secs(5), seen_rx).await??;
    let port = addr.port().to_string();
    assert_eq!(
        seen,
        vec![
            vec!["PING".to_string()],
            vec!["REPLCONF".into(), "listening-port".into(), port],
            vec!["REPLCONF".into(), "capa".into(), "psync2".into()],
            vec!["PSYNC".into(), "?".into(), "-1".into()],
        ]
    );

    // 2) 从节点开始服务
    let mut conn = TcpStream::connect(addr).await?;
    conn.write_all(&protocol::encode_array(&["INFO", "replication"])).await?;
    let mut buf = vec![0u8; 1024];
    let n = conn.read(&mut buf).await?;
    let info = String::from_utf8_lossy(&buf[..n]);
    assert!(info.contains("role:slave"), "unexpected INFO reply {:?}", info);
    assert!(!info.contains("master_replid"));
    Ok(())
}

#[tokio::test]
async fn test_replica_aborts_on_bad_pong() -> Result<()> {
    let (primary_port, _seen) = fake_primary(vec!["-ERR go away\r\n"]).await?;

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    let server = Server::new(replica_config(port, primary_port));

    let res = tokio::time::timeout(Duration::from_secs(5), server.run_with_listener(listener)).await?;
    let err = res.unwrap_err();
    assert!(format!("{:#}", err).contains("unexpected reply to PING"), "{:#}", err);
    Ok(())
}

#[tokio::test]
async fn test_replica_aborts_when_primary_unreachable() -> Result<()> {
    // 先占一个端口再释放，保证没人在监听
    let unused = TcpListener::bind("127.0.0.1:0").await?;
    let primary_port = unused.local_addr()?.port();
    drop(unused);

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    let server = Server::new(replica_config(port, primary_port));

    let res = tokio::time::timeout(Duration::from_secs(5), server.run_with_listener(listener)).await?;
    assert!(res.is_err());
    Ok(())
}
