//! Event type definitions
//!
//! An [`EventRecord`] is produced by a probe handler and handed straight to
//! the reporter. Records borrow from the probe arguments so building one does
//! not copy argument vectors.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::category::Category;

/// Timestamp in nanoseconds since UNIX epoch
pub type Timestamp = u64;

/// Process (task) ID
pub type Pid = i32;

/// Identity of the task that invoked an observed operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Caller {
    /// Task ID
    pub pid: Pid,

    /// Task name (comm)
    pub comm: String,
}

impl Caller {
    pub fn new(pid: Pid, comm: impl Into<String>) -> Self {
        Self {
            pid,
            comm: comm.into(),
        }
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PID: {} ({})", self.pid, self.comm)
    }
}

/// Socket type as reported by bind events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SockType {
    #[serde(rename = "SOCK_STREAM")]
    Stream,
    #[serde(rename = "SOCK_DGRAM")]
    Dgram,
    #[serde(rename = "SOCK_OTHER")]
    Other,
}

impl SockType {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => SockType::Stream,
            2 => SockType::Dgram,
            _ => SockType::Other,
        }
    }
}

impl fmt::Display for SockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SockType::Stream => "SOCK_STREAM",
            SockType::Dgram => "SOCK_DGRAM",
            SockType::Other => "SOCK_OTHER",
        })
    }
}

/// Operation specific payload of an event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventFields<'a> {
    InetBind {
        proto: SockType,
        port: u16,
    },
    /// `port` is `None` for address families other than AF_INET/AF_INET6
    Bind {
        fd: i32,
        family: u16,
        port: Option<u16>,
    },
    /// `assigned_port` is 0 when the bound port could not be resolved
    BindReturn {
        retval: i64,
        assigned_port: u16,
    },
    Accept,
    RegisterVlan {
        dev: &'a str,
        vlan_id: u16,
    },
    InsertIfa {
        device: &'a str,
        address: u32,
    },
    BridgeAddIf {
        bridge: &'a str,
        dev: &'a str,
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
        mountpoint: Option<&'a str>,
        device: Option<&'a str>,
        fs_type: Option<&'a str>,
    },
    Mknod {
        file: &'a str,
        major: u32,
        minor: u32,
    },
    Unlink {
        file: &'a str,
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
        file: &'a str,
    },
    Close {
        fd: u32,
    },
    Execve {
        argv: &'a [String],
        envp: &'a [String],
    },
    Analyze {
        argv: &'a [String],
        envp: &'a [String],
    },
    Fork {
        clone_flags: u64,
        stack_size: u64,
    },
    ForkReturn {
        retval: i64,
    },
    Exit {
        code: i64,
    },
    Signal {
        target_pid: Pid,
        signal: u32,
    },
    Mmap {
        start: u64,
        end: u64,
        file: Option<&'a str>,
    },
}

/// One observed event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord<'a> {
    pub timestamp: Timestamp,
    pub category: Category,
    /// Probed symbol
    pub operation: &'static str,
    pub caller: &'a Caller,
    pub fields: EventFields<'a>,
}

impl<'a> EventRecord<'a> {
    pub fn new(
        category: Category,
        operation: &'static str,
        caller: &'a Caller,
        fields: EventFields<'a>,
    ) -> Self {
        Self {
            timestamp: crate::utils::time::system_time_nanos(),
            category,
            operation,
            caller,
            fields,
        }
    }
}

fn or_null(s: Option<&str>) -> &str {
    s.unwrap_or("(null)")
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[String]) -> fmt::Result {
    for item in items {
        write!(f, " {}", item)?;
    }
    Ok(())
}

impl fmt::Display for EventRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = self.operation;
        let caller = self.caller;

        match &self.fields {
            EventFields::BindReturn {
                retval,
                assigned_port,
            } => {
                return write!(
                    f,
                    "{}_ret[{}] = {} [Assigned Port: {}]",
                    op, caller, retval, assigned_port
                )
            }
            EventFields::ForkReturn { retval } => {
                return write!(f, "{}_ret[{}] = {}", op, caller, retval)
            }
            EventFields::Analyze { argv, envp } => {
                write!(f, "[ANALYZE] [{}]:", caller)?;
                write_list(f, argv)?;
                f.write_str("\nenvp:")?;
                return write_list(f, envp);
            }
            _ => {}
        }

        write!(f, "{}[{}]:", op, caller)?;

        match &self.fields {
            EventFields::InetBind { proto, port } => {
                write!(f, " proto:{}, port:{}", proto, port)
            }
            EventFields::Bind { fd, family, port } => match port {
                Some(port) => write!(f, " fd:{} family:{} port: {}", fd, family, port),
                None => write!(f, " fd:{} family:{} port:0 (Port not captured.)", fd, family),
            },
            EventFields::Accept => Ok(()),
            EventFields::RegisterVlan { dev, vlan_id } => {
                write!(f, " dev:{} vlan_id:{}", dev, vlan_id)
            }
            EventFields::InsertIfa { device, address } => {
                write!(f, " device:{} ifa:0x{:08x}", device, address)
            }
            EventFields::BridgeAddIf { bridge, dev } => {
                write!(f, " br:{} dev:{}", bridge, dev)
            }
            EventFields::Socket {
                family,
                sock_type,
                protocol,
            } => write!(
                f,
                " family:{}, type:{}, protocol:{}",
                family, sock_type, protocol
            ),
            EventFields::SetSockOpt { fd, level, optname } => {
                write!(f, " fd:{}, level:{}, optname:{}", fd, level, optname)
            }
            EventFields::Mount {
                mountpoint,
                device,
                fs_type,
            } => write!(
                f,
                " mountpoint:{}, device:{}, type:{}",
                or_null(*mountpoint),
                or_null(*device),
                or_null(*fs_type)
            ),
            EventFields::Mknod { file, major, minor } => {
                write!(f, " file:{} major:{} minor:{}", file, major, minor)
            }
            EventFields::Unlink { file } | EventFields::Open { file } => {
                write!(f, " file:{}", file)
            }
            EventFields::Ioctl { cmd, arg } => write!(f, " cmd:0x{:x} arg:0x{:x}", cmd, arg),
            EventFields::Reboot {
                magic1,
                magic2,
                cmd,
            } => write!(f, " magic1:{:x}, magic2:{:x}, cmd:{:x}", magic1, magic2, cmd),
            EventFields::Close { fd } => write!(f, " fd:{}", fd),
            EventFields::Execve { argv, envp } => {
                f.write_str(" argv:")?;
                write_list(f, argv)?;
                f.write_str(", envp:")?;
                write_list(f, envp)
            }
            EventFields::Fork {
                clone_flags,
                stack_size,
            } => write!(
                f,
                " clone_flags:0x{:x}, stack_size:0x{:x}",
                clone_flags, stack_size
            ),
            EventFields::Exit { code } => write!(f, " code:{}", code),
            EventFields::Signal { target_pid, signal } => {
                write!(f, " PID:{}, signal:{}", target_pid, signal)
            }
            EventFields::Mmap { start, end, file } => {
                write!(f, " addr:0x{:x} -> 0x{:x}", start, end)?;
                match file {
                    Some(file) => write!(f, ", file:{}", file),
                    None => Ok(()),
                }
            }
            EventFields::BindReturn { .. }
            | EventFields::ForkReturn { .. }
            | EventFields::Analyze { .. } => Ok(()),
        }
    }
}
