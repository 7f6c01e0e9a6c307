// src/protocol.rs

//! RESP 协议编解码
//!
//! - 请求只支持 Array + Bulk String 的帧格式：`*<N>\r\n` 后跟 N 个 `$<len>\r\n<data>\r\n`
//! - 回复支持 Simple String / Bulk String / Array / Error / Null 五种形式
//! - 解码永不报错：遇到格式不对就停下，返回已经解析出的部分，交给分发层校验

use bytes::{BufMut, Bytes, BytesMut};

/// 一条客户端请求：命令名 + 参数
pub type Request = Vec<Bytes>;

/// 分发层产生的回复，每个请求恰好对应一个
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Simple(String),
    Bulk(Bytes),
    Array(Vec<Bytes>),
    Error(String),
    Null,
}

impl Reply {
    pub fn ok() -> Self {
        Reply::Simple("OK".to_string())
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Reply::Error(msg.into())
    }

    /// 编码成线上字节
    pub fn encode(&self) -> Bytes {
        match self {
            Reply::Simple(s) => encode_simple_string(s),
            Reply::Bulk(b) => encode_bulk_string(b),
            Reply::Array(items) => encode_array(items),
            Reply::Error(msg) => encode_error(msg),
            Reply::Null => encode_null(),
        }
    }
}

pub fn encode_simple_string(s: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(s.len() + 3);
    buf.put_u8(b'+');
    buf.put_slice(s.as_bytes());
    buf.put_slice(b"\r\n");
    buf.freeze()
}

pub fn encode_bulk_string(data: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(data.len() + 16);
    put_bulk(&mut buf, data);
    buf.freeze()
}

/// `*<n>\r\n` 之后每个元素都按 Bulk String 编码
pub fn encode_array<T: AsRef<[u8]>>(items: &[T]) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_slice(format!("*{}\r\n", items.len()).as_bytes());
    for item in items {
        put_bulk(&mut buf, item.as_ref());
    }
    buf.freeze()
}

pub fn encode_error(msg: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(msg.len() + 3);
    buf.put_u8(b'-');
    buf.put_slice(msg.as_bytes());
    buf.put_slice(b"\r\n");
    buf.freeze()
}

pub fn encode_null() -> Bytes {
    Bytes::from_static(b"$-1\r\n")
}

fn put_bulk(buf: &mut BytesMut, data: &[u8]) {
    buf.put_slice(format!("${}\r\n", data.len()).as_bytes());
    buf.put_slice(data);
    buf.put_slice(b"\r\n");
}

/// 解码一条请求
///
/// 典型输入：`*2\r\n$3\r\nGET\r\n$3\r\nkey\r\n`
///
/// 头部缺失或无法解析时返回空请求；某个元素的长度非法时，
/// 返回此前已解析出的元素。声明长度与实际数据不符时按声明长度截断。
pub fn decode_request(data: &[u8]) -> Request {
    let mut args = Vec::new();

    // 1) "*<N>"
    let Some((header, mut rest)) = split_line(data) else {
        return args;
    };
    let count = match header.strip_prefix(b"*").and_then(parse_int) {
        Some(n) if n >= 0 => n,
        _ => return args,
    };

    for _ in 0..count {
        // 2) "$<len>"
        let Some((line, after)) = split_line(rest) else {
            break;
        };
        let len = match line.strip_prefix(b"$").and_then(parse_int) {
            Some(n) if n >= 0 => n as usize,
            _ => break,
        };

        // 3) payload：数据完整时按长度切，二进制安全
        if after.len() >= len + 2 && &after[len..len + 2] == b"\r\n" {
            args.push(Bytes::copy_from_slice(&after[..len]));
            rest = &after[len + 2..];
            continue;
        }

        // 否则退回按行读取，再截断到声明长度
        let Some((payload, after)) = split_line(after) else {
            break;
        };
        let take = len.min(payload.len());
        args.push(Bytes::copy_from_slice(&payload[..take]));
        rest = after;
    }

    args
}

/// 解析 `+<text>\r\n`，前缀或结尾不对时返回空串
pub fn decode_simple_string(data: &[u8]) -> String {
    let Some(body) = data.strip_prefix(b"+") else {
        return String::new();
    };
    match body.windows(2).position(|w| w == b"\r\n") {
        Some(end) => String::from_utf8_lossy(&body[..end]).into_owned(),
        None => String::new(),
    }
}

/// 切出一行（去掉 `\r\n` 或 `\n`），没有换行时整段算一行
fn split_line(data: &[u8]) -> Option<(&[u8], &[u8])> {
    if data.is_empty() {
        return None;
    }
    let (line, rest) = match data.iter().position(|&b| b == b'\n') {
        Some(idx) => (&data[..idx], &data[idx + 1..]),
        None => (data, &data[data.len()..]),
    };
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    Some((line, rest))
}

fn parse_int(digits: &[u8]) -> Option<i64> {
    std::str::from_utf8(digits).ok()?.parse().ok()
}
