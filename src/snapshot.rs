// src/snapshot.rs

//! RDB 快照加载
//!
//! 启动时读取 `<dir>/<dbfilename>`，把其中的字符串键值写入 Store。
//! 文件结构：
//!
//! ```text
//! "REDIS0011"                      9 字节头
//! 0xFA <name> <value> ...          元数据，跳过
//! 0xFE <db> [0xFB <size> <size>]   数据库段
//!   [0xFD <u32 秒> | 0xFC <u64 毫秒>] 0x00 <key> <value>
//!   ...
//! 0xFF <8 字节校验和>               文件结束，校验和不做校验
//! ```
//!
//! 文件不存在不算错误；解析出错时已写入的记录保留，不回滚。

use std::io::ErrorKind;
use std::path::Path;

use bytes::Bytes;
use tracing::{debug, info};

use crate::error::SnapshotError;
use crate::expire;
use crate::store::Store;

pub const MAGIC: &[u8] = b"REDIS";
pub const HEADER_LEN: usize = 9;

pub const OP_METADATA: u8 = 0xFA;
pub const OP_RESIZE_DB: u8 = 0xFB;
pub const OP_EXPIRE_MS: u8 = 0xFC;
pub const OP_EXPIRE_SECS: u8 = 0xFD;
pub const OP_SELECT_DB: u8 = 0xFE;
pub const OP_EOF: u8 = 0xFF;

pub const TYPE_STRING: u8 = 0x00;

const CHECKSUM_LEN: usize = 8;

/// 解析出的一条记录，随即写入 Store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRecord {
    pub key: Bytes,
    pub value: Bytes,
    /// 绝对过期时间（UNIX 毫秒）
    pub expire_at_ms: Option<u64>,
}

/// 一次加载的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// 文件不存在，以空库启动
    Missing,
    Loaded { inserted: usize, expired: usize },
}

/// 从文件加载快照
pub fn load_file(path: &Path, store: &Store) -> Result<LoadOutcome, SnapshotError> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "snapshot file not found, starting with empty database");
            return Ok(LoadOutcome::Missing);
        }
        Err(e) => return Err(e.into()),
    };
    load_bytes(&data, store, expire::now_unix_ms())
}

/// 从内存中的快照字节加载，`now_ms` 为判定过期所用的当前 UNIX 毫秒
pub fn load_bytes(data: &[u8], store: &Store, now_ms: u64) -> Result<LoadOutcome, SnapshotError> {
    let mut inserted = 0;
    let mut expired = 0;

    Parser::new(data).parse(|record| match record.expire_at_ms {
        None => {
            store.set(record.key, record.value);
            inserted += 1;
        }
        Some(at) => match expire::remaining_until(at, now_ms) {
            Some(ttl) => {
                store.set_with_expiry(record.key, record.value, ttl);
                inserted += 1;
            }
            None => expired += 1,
        },
    })?;

    Ok(LoadOutcome::Loaded { inserted, expired })
}

/// 按字节游标解析快照；「回退一个字节」用 peek 实现
struct Parser<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Parser { buf, pos: 0 }
    }

    fn parse<F>(&mut self, mut sink: F) -> Result<(), SnapshotError>
    where
        F: FnMut(SnapshotRecord),
    {
        self.read_header()?;
        self.skip_metadata()?;
        self.read_databases(&mut sink)
    }

    fn read_header(&mut self) -> Result<(), SnapshotError> {
        let header = self.take(HEADER_LEN).map_err(|_| SnapshotError::BadHeader)?;
        if !header.starts_with(MAGIC) {
            return Err(SnapshotError::BadHeader);
        }
        debug!(version = %String::from_utf8_lossy(&header[MAGIC.len()..]), "snapshot header ok");
        Ok(())
    }

    fn skip_metadata(&mut self) -> Result<(), SnapshotError> {
        while let Some(op) = self.peek() {
            match op {
                OP_METADATA => {
                    self.pos += 1;
                    let name = self.read_string()?;
                    let value = self.read_string()?;
                    debug!(
                        name = %String::from_utf8_lossy(&name),
                        value = %String::from_utf8_lossy(&value),
                        "skipping snapshot metadata"
                    );
                }
                // 段边界只看不吃
                OP_SELECT_DB | OP_EOF => return Ok(()),
                other => {
                    return Err(SnapshotError::UnexpectedOpcode { section: "metadata", opcode: other });
                }
            }
        }
        Ok(())
    }

    fn read_databases<F>(&mut self, sink: &mut F) -> Result<(), SnapshotError>
    where
        F: FnMut(SnapshotRecord),
    {
        while !self.is_eof() {
            match self.read_u8()? {
                OP_SELECT_DB => {
                    self.skip_db_index();
                    if self.peek() == Some(OP_RESIZE_DB) {
                        self.pos += 1;
                        let table_size = self.read_length()?;
                        let expires_size = self.read_length()?;
                        debug!(table_size, expires_size, "snapshot resize hint");
                    }
                    self.read_entries(sink)?;
                }
                OP_EOF => {
                    let n = CHECKSUM_LEN.min(self.buf.len() - self.pos);
                    let checksum = self.take(n)?;
                    debug!(checksum = %hex::encode(checksum), "skipping snapshot checksum");
                    return Ok(());
                }
                other => {
                    return Err(SnapshotError::UnexpectedOpcode { section: "database", opcode: other });
                }
            }
        }
        Ok(())
    }

    /// 读一个数据库内的所有键值，直到下一个 0xFE / 0xFF
    fn read_entries<F>(&mut self, sink: &mut F) -> Result<(), SnapshotError>
    where
        F: FnMut(SnapshotRecord),
    {
        while let Some(marker) = self.peek() {
            if marker == OP_SELECT_DB || marker == OP_EOF {
                break;
            }
            self.pos += 1;

            let (expire_at_ms, value_type) = match marker {
                OP_EXPIRE_SECS => {
                    let secs = u32::from_le_bytes(self.take_array()?);
                    (Some(u64::from(secs) * 1000), self.read_u8()?)
                }
                OP_EXPIRE_MS => {
                    let ms = u64::from_le_bytes(self.take_array()?);
                    (Some(ms), self.read_u8()?)
                }
                other => (None, other),
            };

            if value_type != TYPE_STRING {
                return Err(SnapshotError::UnsupportedValueType(value_type));
            }

            let key = self.read_string()?;
            let value = self.read_string()?;
            sink(SnapshotRecord { key, value, expire_at_ms });
        }
        Ok(())
    }

    /// redis 写出的文件在 0xFE 后面是「数据库编号 + 0xFB」。
    /// 只有编号后紧跟 0xFB 时才把它当作编号吃掉，
    /// 其余情况按 0xFE 后直接是记录处理。
    fn skip_db_index(&mut self) {
        let Some(index) = self.peek() else { return };
        if index >> 6 != 0b00 {
            return;
        }
        if self.buf.get(self.pos + 1) == Some(&OP_RESIZE_DB) {
            debug!(db = index, "selecting snapshot database");
            self.pos += 1;
        }
    }

    /// 长度编码：首字节高 2 位决定格式
    fn read_length(&mut self) -> Result<u64, SnapshotError> {
        let first = self.read_u8()?;
        let len = match first >> 6 {
            0b00 => u64::from(first & 0x3F),
            0b01 => {
                let second = self.read_u8()?;
                (u64::from(first & 0x3F) << 8) | u64::from(second)
            }
            0b10 => u64::from(u32::from_be_bytes(self.take_array()?)),
            _ => self.read_special_int(first & 0x3F)?.unwrap_or(0),
        };
        Ok(len)
    }

    /// 特殊编码：把 8/16/32 位整数当作字符串存储，其余格式不支持
    fn read_special_int(&mut self, format: u8) -> Result<Option<u64>, SnapshotError> {
        let value = match format {
            0 => u64::from(self.read_u8()?),
            1 => u64::from(u16::from_le_bytes(self.take_array()?)),
            2 => u64::from(u32::from_le_bytes(self.take_array()?)),
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    fn read_string(&mut self) -> Result<Bytes, SnapshotError> {
        let first = self.peek().ok_or(SnapshotError::UnexpectedEof(self.pos))?;
        if first >> 6 == 0b11 {
            self.pos += 1;
            return Ok(match self.read_special_int(first & 0x3F)? {
                Some(n) => Bytes::from(n.to_string()),
                None => Bytes::new(),
            });
        }

        let len = self.read_length()?;
        let len = usize::try_from(len).map_err(|_| SnapshotError::UnexpectedEof(self.pos))?;
        Ok(Bytes::copy_from_slice(self.take(len)?))
    }

    fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn read_u8(&mut self) -> Result<u8, SnapshotError> {
        let b = self.peek().ok_or(SnapshotError::UnexpectedEof(self.pos))?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], SnapshotError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or(SnapshotError::UnexpectedEof(self.pos))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], SnapshotError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }
}
