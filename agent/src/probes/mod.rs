//! Probe catalogue
//!
//! The closed set of operations this engine observes. Each descriptor pairs
//! a symbol with its entry handler and, for operations whose result is only
//! known on return, an exit handler.

pub mod handlers;
pub mod registry;

use hookwatch_shared::{Caller, Category, Pid};
use serde::{Deserialize, Serialize};

use crate::engine::Engine;

pub use registry::{ProbeRegistry, RegistrationError};

/// Invoked by the host when a probed symbol is entered
pub type EntryHandler = fn(&Engine, &Caller, &EntryArgs);

/// Invoked by the host when a probed symbol returns
pub type ExitHandler = fn(&Engine, &Caller, &ExitArgs);

/// Arguments captured at entry of a probed operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryArgs {
    InetBind {
        sock_type: i32,
        port: u16,
    },
    /// `port` is only meaningful for AF_INET and AF_INET6
    Bind {
        fd: i32,
        family: u16,
        #[serde(default)]
        port: u16,
    },
    Inet6Bind {
        sock_type: i32,
        port: u16,
    },
    Accept {
        #[serde(default)]
        flags: i32,
    },
    RegisterVlan {
        dev: String,
        vlan_id: u16,
    },
    InsertIfa {
        device: String,
        address: u32,
    },
    BridgeAddIf {
        bridge: String,
        dev: String,
    },
    Socket {
        family: i32,
        sock_type: i32,
        protocol: i32,
    },
    SetSockOpt {
        fd: i32,
        level: i32,
        optname: i32,
    },
    Mount {
        dev_name: Option<String>,
        dir_name: Option<String>,
        fs_type: Option<String>,
        #[serde(default)]
        flags: u64,
    },
    Mknod {
        file: String,
        dev: u32,
    },
    Unlink {
        file: String,
    },
    Ioctl {
        cmd: u32,
        arg: u64,
    },
    Reboot {
        magic1: u32,
        magic2: u32,
        cmd: u32,
    },
    Open {
        filename: String,
        #[serde(default)]
        flags: i32,
        #[serde(default)]
        mode: u32,
    },
    Close {
        fd: u32,
    },
    Execve {
        filename: String,
        #[serde(default)]
        argv: Vec<String>,
        #[serde(default)]
        envp: Vec<String>,
    },
    Fork {
        clone_flags: u64,
        #[serde(default)]
        stack_start: u64,
        stack_size: u64,
    },
    Exit {
        code: i64,
    },
    Signal {
        sig: u32,
        target_pid: Pid,
        #[serde(default)]
        group: bool,
    },
    Mmap {
        file: Option<String>,
        addr: u64,
        len: u64,
        vm_flags: u64,
        #[serde(default)]
        pgoff: u64,
    },
}

impl EntryArgs {
    pub fn kind(&self) -> &'static str {
        match self {
            EntryArgs::InetBind { .. } => "inet_bind",
            EntryArgs::Bind { .. } => "bind",
            EntryArgs::Inet6Bind { .. } => "inet6_bind",
            EntryArgs::Accept { .. } => "accept",
            EntryArgs::RegisterVlan { .. } => "register_vlan",
            EntryArgs::InsertIfa { .. } => "insert_ifa",
            EntryArgs::BridgeAddIf { .. } => "bridge_add_if",
            EntryArgs::Socket { .. } => "socket",
            EntryArgs::SetSockOpt { .. } => "set_sock_opt",
            EntryArgs::Mount { .. } => "mount",
            EntryArgs::Mknod { .. } => "mknod",
            EntryArgs::Unlink { .. } => "unlink",
            EntryArgs::Ioctl { .. } => "ioctl",
            EntryArgs::Reboot { .. } => "reboot",
            EntryArgs::Open { .. } => "open",
            EntryArgs::Close { .. } => "close",
            EntryArgs::Execve { .. } => "execve",
            EntryArgs::Fork { .. } => "fork",
            EntryArgs::Exit { .. } => "exit",
            EntryArgs::Signal { .. } => "signal",
            EntryArgs::Mmap { .. } => "mmap",
        }
    }
}

/// Return value observed at exit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitArgs {
    pub retval: i64,
}

/// One entry of the catalogue
#[derive(Clone, Copy)]
pub struct ProbeDescriptor {
    pub symbol: &'static str,
    pub category: Category,
    pub entry: EntryHandler,
    pub exit: Option<ExitHandler>,
}

const fn probe(symbol: &'static str, category: Category, entry: EntryHandler) -> ProbeDescriptor {
    ProbeDescriptor {
        symbol,
        category,
        entry,
        exit: None,
    }
}

const fn probe_ret(
    symbol: &'static str,
    category: Category,
    entry: EntryHandler,
    exit: ExitHandler,
) -> ProbeDescriptor {
    ProbeDescriptor {
        symbol,
        category,
        entry,
        exit: Some(exit),
    }
}

/// Every probed operation, in installation order
///
/// `do_execve` is listed under System; its analyze line is gated separately.
pub static CATALOGUE: [ProbeDescriptor; 21] = [
    probe("inet_bind", Category::Network, handlers::inet_bind),
    probe_ret(
        "sys_bind",
        Category::Network,
        handlers::sys_bind,
        handlers::sys_bind_ret,
    ),
    probe("inet6_bind", Category::Network, handlers::inet6_bind),
    probe("inet_accept", Category::Network, handlers::inet_accept),
    probe("register_vlan_dev", Category::Network, handlers::register_vlan_dev),
    probe("__inet_insert_ifa", Category::Network, handlers::inet_insert_ifa),
    probe("br_add_if", Category::Network, handlers::br_add_if),
    probe("sys_socket", Category::Network, handlers::sys_socket),
    probe("sys_setsockopt", Category::Network, handlers::sys_setsockopt),
    probe("do_mount", Category::System, handlers::do_mount),
    probe("vfs_mknod", Category::FsWrite, handlers::vfs_mknod),
    probe("vfs_unlink", Category::FsWrite, handlers::vfs_unlink),
    probe("do_vfs_ioctl", Category::System, handlers::do_vfs_ioctl),
    probe("sys_reboot", Category::System, handlers::sys_reboot),
    probe("do_sys_open", Category::FsRead, handlers::do_sys_open),
    probe("sys_close", Category::FsRead, handlers::sys_close),
    probe("do_execve", Category::System, handlers::do_execve),
    probe_ret(
        "do_fork",
        Category::Exec,
        handlers::do_fork,
        handlers::do_fork_ret,
    ),
    probe("do_exit", Category::Exec, handlers::do_exit),
    probe("do_send_sig_info", Category::Exec, handlers::do_send_sig_info),
    probe("mmap_region", Category::Exec, handlers::mmap_region),
];

/// Look up a descriptor by symbol
pub fn find(symbol: &str) -> Option<&'static ProbeDescriptor> {
    CATALOGUE.iter().find(|d| d.symbol == symbol)
}
