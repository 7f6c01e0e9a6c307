// src/replication.rs

//! 从节点启动时与主节点的握手
//!
//! 严格按顺序执行，每一步都等上一步的回复：
//!
//! ```text
//! -> PING                             <- +PONG
//! -> REPLCONF listening-port <port>   <- +OK
//! -> REPLCONF capa psync2             <- +OK
//! -> PSYNC ? -1                       <- +FULLRESYNC <replid> <offset>（只读取，不校验）
//! ```
//!
//! 握手成功后连接保持打开，但不再读取后续的快照或写命令流。

use std::fmt;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::info;

use crate::config::ReplicaOf;
use crate::error::HandshakeError;
use crate::protocol;

const REPLY_BUF_LEN: usize = 256;

/// 握手中的一步，用于日志与错误信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStep {
    Ping,
    ListeningPort,
    Capa,
    Psync,
}

impl fmt::Display for HandshakeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HandshakeStep::Ping => "PING",
            HandshakeStep::ListeningPort => "REPLCONF listening-port",
            HandshakeStep::Capa => "REPLCONF capa",
            HandshakeStep::Psync => "PSYNC",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    SendPing,
    AwaitPong,
    SendPort,
    AwaitPortOk,
    SendCapa,
    AwaitCapaOk,
    SendPsync,
    AwaitFullResync,
    Done,
}

impl HandshakeState {
    pub fn step(self) -> Option<HandshakeStep> {
        use HandshakeState::*;
        match self {
            SendPing | AwaitPong => Some(HandshakeStep::Ping),
            SendPort | AwaitPortOk => Some(HandshakeStep::ListeningPort),
            SendCapa | AwaitCapaOk => Some(HandshakeStep::Capa),
            SendPsync | AwaitFullResync => Some(HandshakeStep::Psync),
            Done => None,
        }
    }

    pub fn next(self) -> Self {
        use HandshakeState::*;
        match self {
            SendPing => AwaitPong,
            AwaitPong => SendPort,
            SendPort => AwaitPortOk,
            AwaitPortOk => SendCapa,
            SendCapa => AwaitCapaOk,
            AwaitCapaOk => SendPsync,
            SendPsync => AwaitFullResync,
            AwaitFullResync | Done => Done,
        }
    }
}

/// 握手完成后保留的主节点连接
#[derive(Debug)]
pub struct ReplicationLink<S> {
    /// 只持有，不读取
    _stream: S,
    /// PSYNC 的回复（例如 `FULLRESYNC <replid> 0`），可能为空
    pub resync_reply: String,
}

/// 握手状态机，可以跑在任意双向字节流上
pub struct Handshake<S> {
    stream: S,
    listening_port: u16,
    timeout: Option<Duration>,
    state: HandshakeState,
    buf: [u8; REPLY_BUF_LEN],
}

impl<S> Handshake<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, listening_port: u16, timeout: Option<Duration>) -> Self {
        Handshake {
            stream,
            listening_port,
            timeout,
            state: HandshakeState::SendPing,
            buf: [0; REPLY_BUF_LEN],
        }
    }

    /// 把状态机一直推进到 Done
    pub async fn run(mut self) -> Result<ReplicationLink<S>, HandshakeError> {
        let port = self.listening_port.to_string();
        let mut resync_reply = String::new();

        loop {
            match self.state {
                HandshakeState::SendPing => self.send(&["PING"]).await?,
                HandshakeState::AwaitPong => self.expect("PONG").await?,
                HandshakeState::SendPort => {
                    self.send(&["REPLCONF", "listening-port", port.as_str()]).await?
                }
                HandshakeState::AwaitPortOk => self.expect("OK").await?,
                HandshakeState::SendCapa => self.send(&["REPLCONF", "capa", "psync2"]).await?,
                HandshakeState::AwaitCapaOk => self.expect("OK").await?,
                HandshakeState::SendPsync => self.send(&["PSYNC", "?", "-1"]).await?,
                HandshakeState::AwaitFullResync => {
                    resync_reply = self.receive().await?;
                    info!(reply = %resync_reply, "received PSYNC reply from primary");
                }
                HandshakeState::Done => {
                    info!("handshake with primary completed");
                    return Ok(ReplicationLink { _stream: self.stream, resync_reply });
                }
            }
            self.state = self.state.next();
        }
    }

    fn current_step(&self) -> HandshakeStep {
        self.state.step().unwrap_or(HandshakeStep::Psync)
    }

    async fn send(&mut self, parts: &[&str]) -> Result<(), HandshakeError> {
        let step = self.current_step();
        let frame = protocol::encode_array(parts);
        self.stream
            .write_all(&frame)
            .await
            .map_err(|source| HandshakeError::Send { step, source })?;
        info!(%step, "sent to primary");
        Ok(())
    }

    async fn expect(&mut self, wanted: &str) -> Result<(), HandshakeError> {
        let step = self.current_step();
        let reply = self.receive().await?;
        if reply != wanted {
            return Err(HandshakeError::UnexpectedReply { step, reply });
        }
        info!(%step, reply = %reply, "primary acknowledged");
        Ok(())
    }

    /// 读一次回复并按 Simple String 解析
    async fn receive(&mut self) -> Result<String, HandshakeError> {
        let step = self.current_step();
        let read = self.stream.read(&mut self.buf);
        let n = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| HandshakeError::Timeout { step })?,
            None => read.await,
        }
        .map_err(|source| HandshakeError::Receive { step, source })?;

        if n == 0 {
            return Err(HandshakeError::Closed { step });
        }
        Ok(protocol::decode_simple_string(&self.buf[..n]))
    }
}

/// 连接主节点并完成握手
pub async fn connect_to_primary(
    primary: &ReplicaOf,
    listening_port: u16,
    timeout: Option<Duration>,
) -> Result<ReplicationLink<TcpStream>, HandshakeError> {
    let addr = primary.addr();
    let connect = TcpStream::connect(&addr);
    let stream = match timeout {
        Some(limit) => match tokio::time::timeout(limit, connect).await {
            Ok(res) => res,
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out")),
        },
        None => connect.await,
    }
    .map_err(|source| HandshakeError::Connect { addr: addr.clone(), source })?;

    info!(primary = %addr, "connected to primary");
    Handshake::new(stream, listening_port, timeout).run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{DuplexStream, duplex};

    /// 假主节点：按顺序校验收到的命令并回复
    async fn fake_primary(mut peer: DuplexStream, replies: Vec<&'static str>) -> Vec<Vec<u8>> {
        let mut seen = Vec::new();
        for reply in replies {
            let mut buf = [0u8; 512];
            let n = peer.read(&mut buf).await.unwrap();
            seen.push(buf[..n].to_vec());
            peer.write_all(reply.as_bytes()).await.unwrap();
        }
        seen
    }

    #[test]
    fn state_machine_order() {
        let mut state = HandshakeState::SendPing;
        let mut visited = vec![state];
        while state != HandshakeState::Done {
            state = state.next();
            visited.push(state);
        }
        assert_eq!(visited.len(), 9);
        assert_eq!(HandshakeState::AwaitCapaOk.step(), Some(HandshakeStep::Capa));
        assert_eq!(HandshakeState::Done.step(), None);
    }

    #[tokio::test]
    async fn completes_against_fake_primary() {
        let (ours, theirs) = duplex(1024);
        let primary = tokio::spawn(fake_primary(
            theirs,
            vec![
                "+PONG\r\n",
                "+OK\r\n",
                "+OK\r\n",
                "+FULLRESYNC 8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb 0\r\n",
            ],
        ));

        let link = Handshake::new(ours, 6380, None).run().await.unwrap();
        assert_eq!(link.resync_reply, "FULLRESYNC 8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb 0");

        let seen = primary.await.unwrap();
        assert_eq!(seen[0], b"*1\r\n$4\r\nPING\r\n");
        assert_eq!(seen[1], b"*3\r\n$8\r\nREPLCONF\r\n$14\r\nlistening-port\r\n$4\r\n6380\r\n");
        assert_eq!(seen[2], b"*3\r\n$8\r\nREPLCONF\r\n$4\r\ncapa\r\n$6\r\npsync2\r\n");
        assert_eq!(seen[3], b"*3\r\n$5\r\nPSYNC\r\n$1\r\n?\r\n$2\r\n-1\r\n");
    }

    #[tokio::test]
    async fn unexpected_reply_aborts() {
        let (ours, theirs) = duplex(1024);
        tokio::spawn(fake_primary(theirs, vec!["+PONG\r\n", "-ERR nope\r\n"]));

        let err = Handshake::new(ours, 6380, None).run().await.unwrap_err();
        assert!(matches!(
            err,
            HandshakeError::UnexpectedReply { step: HandshakeStep::ListeningPort, .. }
        ));
    }

    #[tokio::test]
    async fn closed_connection_aborts() {
        let (ours, theirs) = duplex(1024);
        drop(theirs);

        let err = Handshake::new(ours, 6380, None).run().await.unwrap_err();
        // 对端已关闭：写入或读取都会失败
        assert!(matches!(
            err,
            HandshakeError::Send { step: HandshakeStep::Ping, .. }
                | HandshakeError::Closed { step: HandshakeStep::Ping }
        ));
    }

    #[tokio::test]
    async fn silent_primary_times_out() {
        let (ours, _theirs) = duplex(1024);

        let err = Handshake::new(ours, 6380, Some(Duration::from_millis(50)))
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, HandshakeError::Timeout { step: HandshakeStep::Ping }));
    }
}
