// src/config.rs

use std::{
    fmt,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 6379;

/// 进程启动后构造一次的只读配置，注入到 Server 和命令分发层
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// 快照所在目录
    pub dir: String,
    /// 快照文件名
    pub dbfilename: String,
    /// 监听端口
    pub port: u16,
    /// 主节点地址，存在即以从节点身份启动
    pub replicaof: Option<ReplicaOf>,
    /// 握手每一步等待回复的上限（毫秒），None 表示一直等
    pub handshake_timeout_ms: Option<u64>,
    /// 日志级别，RUST_LOG 优先
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            dir: ".".to_string(),
            dbfilename: "dump.rdb".to_string(),
            port: DEFAULT_PORT,
            replicaof: None,
            handshake_timeout_ms: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn is_replica(&self) -> bool {
        self.replicaof.is_some()
    }

    /// `<dir>/<dbfilename>`
    pub fn snapshot_path(&self) -> PathBuf {
        Path::new(&self.dir).join(&self.dbfilename)
    }

    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

/// `--replicaof "<host> <port>"`
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ReplicaOf {
    pub host: String,
    pub port: u16,
}

impl ReplicaOf {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ReplicaOf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.host, self.port)
    }
}

impl FromStr for ReplicaOf {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        let (Some(host), Some(port), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(anyhow!("expected \"<host> <port>\", got {:?}", s));
        };
        let port = port
            .parse()
            .with_context(|| format!("invalid primary port {:?}", port))?;
        Ok(ReplicaOf { host: host.to_string(), port })
    }
}

/// 命令行参数，覆盖配置文件中的同名项
#[derive(Parser, Debug, Default)]
#[command(name = "crab-kv", about = "In-memory key-value server speaking RESP", version)]
pub struct Cli {
    /// JSON 配置文件
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub dir: Option<String>,
    #[arg(long)]
    pub dbfilename: Option<String>,
    #[arg(short, long)]
    pub port: Option<u16>,
    /// 形如 "localhost 6379"
    #[arg(long)]
    pub replicaof: Option<ReplicaOf>,
    #[arg(long)]
    pub handshake_timeout_ms: Option<u64>,
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Cli {
    /// 默认值 < 配置文件 < 命令行
    pub fn into_config(self) -> Result<Config> {
        let mut cfg = match &self.config {
            Some(path) => load(path)?,
            None => Config::default(),
        };

        if let Some(dir) = self.dir {
            cfg.dir = dir;
        }
        if let Some(name) = self.dbfilename {
            cfg.dbfilename = name;
        }
        if let Some(port) = self.port {
            cfg.port = port;
        }
        if let Some(primary) = self.replicaof {
            cfg.replicaof = Some(primary);
        }
        if let Some(ms) = self.handshake_timeout_ms {
            cfg.handshake_timeout_ms = Some(ms);
        }
        if let Some(level) = self.log_level {
            cfg.log_level = level;
        }
        Ok(cfg)
    }
}

/// 从指定路径读取并反序列化 JSON 配置
pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {:?}", path))?;
    let cfg: Config = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse config file {:?}", path))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_replicaof() {
        let r: ReplicaOf = "localhost 6380".parse().unwrap();
        assert_eq!(r, ReplicaOf { host: "localhost".into(), port: 6380 });
        assert_eq!(r.addr(), "localhost:6380");

        assert!("localhost".parse::<ReplicaOf>().is_err());
        assert!("localhost abc".parse::<ReplicaOf>().is_err());
        assert!("a 1 extra".parse::<ReplicaOf>().is_err());
    }

    #[test]
    fn cli_overrides_defaults() {
        let cli = Cli::parse_from([
            "crab-kv",
            "--dir",
            "/tmp/redis-files",
            "--dbfilename",
            "x.rdb",
            "--port",
            "6380",
            "--replicaof",
            "127.0.0.1 6379",
        ]);
        let cfg = cli.into_config().unwrap();
        assert_eq!(cfg.snapshot_path(), PathBuf::from("/tmp/redis-files/x.rdb"));
        assert_eq!(cfg.port, 6380);
        assert!(cfg.is_replica());
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn config_file_then_cli() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("crab-kv.json");
        fs::write(&path, r#"{ "dir": "/data", "port": 7000, "handshake_timeout_ms": 500 }"#)?;

        let cli = Cli::parse_from(["crab-kv", "--config", path.to_str().unwrap(), "--port", "7001"]);
        let cfg = cli.into_config()?;
        assert_eq!(cfg.dir, "/data");
        assert_eq!(cfg.dbfilename, "dump.rdb");
        assert_eq!(cfg.port, 7001);
        assert_eq!(cfg.handshake_timeout_ms, Some(500));
        assert!(!cfg.is_replica());
        Ok(())
    }

    #[test]
    fn rejects_unknown_fields() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("bad.json");
        fs::write(&path, r#"{ "aof": true }"#)?;
        assert!(load(&path).is_err());
        Ok(())
    }
}
