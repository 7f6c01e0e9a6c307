// src/error.rs

//! 各模块的错误类型

use std::io;

use thiserror::Error;

use crate::replication::HandshakeStep;

/// 快照文件解析失败
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot file: {0}")]
    Io(#[from] io::Error),

    #[error("invalid snapshot header")]
    BadHeader,

    #[error("unexpected byte 0x{opcode:02X} in {section} section")]
    UnexpectedOpcode { section: &'static str, opcode: u8 },

    #[error("unsupported value type 0x{0:02X}")]
    UnsupportedValueType(u8),

    #[error("snapshot truncated at offset {0}")]
    UnexpectedEof(usize),
}

/// 与主节点握手失败，对启动来说是致命错误
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("failed to connect to primary at {addr}: {source}")]
    Connect { addr: String, source: io::Error },

    #[error("failed to send {step} to primary: {source}")]
    Send { step: HandshakeStep, source: io::Error },

    #[error("failed to receive reply to {step}: {source}")]
    Receive { step: HandshakeStep, source: io::Error },

    #[error("primary closed the connection while awaiting reply to {step}")]
    Closed { step: HandshakeStep },

    #[error("unexpected reply to {step}: {reply:?}")]
    UnexpectedReply { step: HandshakeStep, reply: String },

    #[error("timed out waiting for reply to {step}")]
    Timeout { step: HandshakeStep },
}
