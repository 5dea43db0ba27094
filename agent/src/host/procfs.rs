//! Exit-time socket lookup through procfs
//!
//! Follows `/proc/<pid>/fd/<fd>` to the socket inode and finds that inode in
//! the task's network tables to recover the port the kernel assigned.

use std::fs;
use std::path::PathBuf;

use hookwatch_shared::Pid;

use super::SocketResolver;

const SOCKET_TABLES: [&str; 4] = ["tcp", "tcp6", "udp", "udp6"];

/// Resolver reading a procfs mount
#[derive(Debug, Clone)]
pub struct ProcfsSocketResolver {
    root: PathBuf,
}

impl Default for ProcfsSocketResolver {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl ProcfsSocketResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn socket_inode(&self, pid: Pid, fd: i32) -> Option<u64> {
        let link = self
            .root
            .join(pid.to_string())
            .join("fd")
            .join(fd.to_string());
        let target = fs::read_link(link).ok()?;
        parse_socket_inode(target.to_str()?)
    }
}

impl SocketResolver for ProcfsSocketResolver {
    fn bound_port(&self, pid: Pid, fd: i32) -> Option<u16> {
        let inode = self.socket_inode(pid, fd)?;
        let net = self.root.join(pid.to_string()).join("net");

        SOCKET_TABLES.iter().find_map(|table| {
            let contents = fs::read_to_string(net.join(table)).ok()?;
            find_local_port(&contents, inode)
        })
    }
}

/// Parse a `socket:[<inode>]` link target
pub(crate) fn parse_socket_inode(target: &str) -> Option<u64> {
    target
        .strip_prefix("socket:[")?
        .strip_suffix(']')?
        .parse()
        .ok()
}

/// Find the local port of `inode` in a `/proc/net/{tcp,udp}[6]` table
pub(crate) fn find_local_port(table: &str, inode: u64) -> Option<u16> {
    table.lines().skip(1).find_map(|line| {
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() < 10 || cols[9].parse::<u64>().ok()? != inode {
            return None;
        }
        let (_, port) = cols[1].rsplit_once(':')?;
        u16::from_str_radix(port, 16).ok()
    })
}
