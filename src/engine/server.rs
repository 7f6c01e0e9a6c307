// src/engine/server.rs

//! 连接与服务器类命令：PING / ECHO / CONFIG GET / INFO

use bytes::Bytes;

use super::{Context, wrong_arity};
use crate::monitor::info;
use crate::protocol::Reply;

pub fn ping(_ctx: &Context<'_>, _args: &[Bytes]) -> Reply {
    Reply::Simple("PONG".to_string())
}

pub fn echo(_ctx: &Context<'_>, args: &[Bytes]) -> Reply {
    match args.first() {
        Some(msg) => Reply::Bulk(msg.clone()),
        None => wrong_arity("echo"),
    }
}

/// CONFIG GET <param>，只认识 dir 和 dbfilename
pub fn config(ctx: &Context<'_>, args: &[Bytes]) -> Reply {
    let [subcommand, param, ..] = args else {
        return wrong_arity("config");
    };
    if !subcommand.eq_ignore_ascii_case(b"GET") {
        return Reply::error("ERR Unknown CONFIG subcommand");
    }

    let param = String::from_utf8_lossy(param).to_lowercase();
    let value = match param.as_str() {
        "dir" => &ctx.config.dir,
        "dbfilename" => &ctx.config.dbfilename,
        _ => return Reply::Array(Vec::new()),
    };
    Reply::Array(vec![Bytes::from(param), Bytes::copy_from_slice(value.as_bytes())])
}

/// INFO replication
pub fn info(ctx: &Context<'_>, args: &[Bytes]) -> Reply {
    match args.first() {
        Some(section) if section.eq_ignore_ascii_case(b"replication") => {
            Reply::Bulk(Bytes::from(info::replication_section(ctx.config)))
        }
        _ => Reply::error("ERR wrong section for 'info' command"),
    }
}
