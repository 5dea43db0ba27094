//! Entry and exit handlers for the catalogue
//!
//! Handlers are pure observers. They read the filter, may touch the
//! correlation store or a trigger, and hand at most one record per line to
//! the reporter. A handler installed on the wrong symbol sees an argument
//! kind it does not expect; that firing is dropped with a debug line.

use hookwatch_shared::utils::dev_major_minor;
use hookwatch_shared::{Caller, Category, EventFields, EventRecord, SockType};
use tracing::debug;

use super::{EntryArgs, ExitArgs};
use crate::engine::Engine;

/// Kernel usermode helper; its fork/exec churn is never logged
const KHELPER: &str = "khelper";

const VM_EXEC: u64 = 0x0000_0004;

fn mismatched(symbol: &'static str, args: &EntryArgs) {
    debug!(symbol, kind = args.kind(), "Unexpected argument kind, firing ignored");
}

fn is_khelper(caller: &Caller) -> bool {
    caller.comm == KHELPER
}

fn is_inet(family: u16) -> bool {
    let family = i32::from(family);
    family == libc::AF_INET || family == libc::AF_INET6
}

fn bounded(items: &[String], max: usize) -> &[String] {
    &items[..items.len().min(max)]
}

pub fn inet_bind(engine: &Engine, caller: &Caller, args: &EntryArgs) {
    let &EntryArgs::InetBind { sock_type, port } = args else {
        return mismatched("inet_bind", args);
    };
    engine
        .reporter()
        .report(Category::Network, "inet_bind", caller, || EventFields::InetBind {
            proto: SockType::from_raw(sock_type),
            port,
        });
}

pub fn inet6_bind(engine: &Engine, caller: &Caller, args: &EntryArgs) {
    let &EntryArgs::Inet6Bind { sock_type, port } = args else {
        return mismatched("inet6_bind", args);
    };
    engine
        .reporter()
        .report(Category::Network, "inet6_bind", caller, || EventFields::InetBind {
            proto: SockType::from_raw(sock_type),
            port,
        });
}

/// Caches the descriptor for the exit handler, then logs the requested port
pub fn sys_bind(engine: &Engine, caller: &Caller, args: &EntryArgs) {
    let &EntryArgs::Bind { fd, family, port } = args else {
        return mismatched("sys_bind", args);
    };
    let reporter = engine.reporter();

    if reporter.is_enabled(Category::Network) {
        engine.bind_calls().insert(caller.pid, fd);
    }

    reporter.report(Category::Network, "sys_bind", caller, || EventFields::Bind {
        fd,
        family,
        port: is_inet(family).then_some(port),
    });
}

/// Reports the port the kernel actually bound. A caller with no cached
/// entry, or a failed lookup, reports port 0.
pub fn sys_bind_ret(engine: &Engine, caller: &Caller, ret: &ExitArgs) {
    let reporter = engine.reporter();
    if !reporter.is_enabled(Category::Network) {
        return;
    }

    let assigned_port = engine
        .bind_calls()
        .take(caller.pid)
        .and_then(|fd| engine.sockets().bound_port(caller.pid, fd))
        .unwrap_or(0);

    reporter.report(Category::Network, "sys_bind", caller, || {
        EventFields::BindReturn {
            retval: ret.retval,
            assigned_port,
        }
    });
}

pub fn inet_accept(engine: &Engine, caller: &Caller, args: &EntryArgs) {
    let EntryArgs::Accept { .. } = args else {
        return mismatched("inet_accept", args);
    };
    engine
        .reporter()
        .report(Category::Network, "inet_accept", caller, || EventFields::Accept);
}

pub fn register_vlan_dev(engine: &Engine, caller: &Caller, args: &EntryArgs) {
    let EntryArgs::RegisterVlan { dev, vlan_id } = args else {
        return mismatched("register_vlan_dev", args);
    };
    engine
        .reporter()
        .report(Category::Network, "register_vlan_dev", caller, || {
            EventFields::RegisterVlan {
                dev,
                vlan_id: *vlan_id,
            }
        });
}

pub fn inet_insert_ifa(engine: &Engine, caller: &Caller, args: &EntryArgs) {
    let EntryArgs::InsertIfa { device, address } = args else {
        return mismatched("__inet_insert_ifa", args);
    };
    engine
        .reporter()
        .report(Category::Network, "__inet_insert_ifa", caller, || {
            EventFields::InsertIfa {
                device,
                address: *address,
            }
        });
}

pub fn br_add_if(engine: &Engine, caller: &Caller, args: &EntryArgs) {
    let EntryArgs::BridgeAddIf { bridge, dev } = args else {
        return mismatched("br_add_if", args);
    };
    engine
        .reporter()
        .report(Category::Network, "br_add_if", caller, || EventFields::BridgeAddIf {
            bridge,
            dev,
        });
}

pub fn sys_socket(engine: &Engine, caller: &Caller, args: &EntryArgs) {
    let &EntryArgs::Socket {
        family,
        sock_type,
        protocol,
    } = args
    else {
        return mismatched("sys_socket", args);
    };
    engine
        .reporter()
        .report(Category::Network, "sys_socket", caller, || EventFields::Socket {
            family,
            sock_type,
            protocol,
        });
}

pub fn sys_setsockopt(engine: &Engine, caller: &Caller, args: &EntryArgs) {
    let &EntryArgs::SetSockOpt { fd, level, optname } = args else {
        return mismatched("sys_setsockopt", args);
    };
    engine
        .reporter()
        .report(Category::Network, "sys_setsockopt", caller, || {
            EventFields::SetSockOpt { fd, level, optname }
        });
}

pub fn do_mount(engine: &Engine, caller: &Caller, args: &EntryArgs) {
    let EntryArgs::Mount {
        dev_name,
        dir_name,
        fs_type,
        ..
    } = args
    else {
        return mismatched("do_mount", args);
    };
    engine
        .reporter()
        .report(Category::System, "do_mount", caller, || EventFields::Mount {
            mountpoint: dir_name.as_deref(),
            device: dev_name.as_deref(),
            fs_type: fs_type.as_deref(),
        });
}

pub fn vfs_mknod(engine: &Engine, caller: &Caller, args: &EntryArgs) {
    let EntryArgs::Mknod { file, dev } = args else {
        return mismatched("vfs_mknod", args);
    };
    engine
        .reporter()
        .report(Category::FsWrite, "vfs_mknod", caller, || {
            let (major, minor) = dev_major_minor(*dev);
            EventFields::Mknod { file, major, minor }
        });
}

pub fn vfs_unlink(engine: &Engine, caller: &Caller, args: &EntryArgs) {
    let EntryArgs::Unlink { file } = args else {
        return mismatched("vfs_unlink", args);
    };
    engine
        .reporter()
        .report(Category::FsWrite, "vfs_unlink", caller, || EventFields::Unlink {
            file,
        });
}

pub fn do_vfs_ioctl(engine: &Engine, caller: &Caller, args: &EntryArgs) {
    let &EntryArgs::Ioctl { cmd, arg } = args else {
        return mismatched("do_vfs_ioctl", args);
    };
    engine
        .reporter()
        .report(Category::System, "do_vfs_ioctl", caller, || EventFields::Ioctl {
            cmd,
            arg,
        });
}

/// Logged whenever System is enabled or the restart trigger is armed, then
/// handed to the restart trigger
pub fn sys_reboot(engine: &Engine, caller: &Caller, args: &EntryArgs) {
    let &EntryArgs::Reboot {
        magic1,
        magic2,
        cmd,
    } = args
    else {
        return mismatched("sys_reboot", args);
    };
    let reporter = engine.reporter();
    let restart = engine.restart();

    let record = EventRecord::new(
        Category::System,
        "sys_reboot",
        caller,
        EventFields::Reboot {
            magic1,
            magic2,
            cmd,
        },
    );
    if restart.is_enabled() {
        reporter.emit_unfiltered(&record);
    } else {
        reporter.emit(&record);
    }

    let outcome = restart.on_reboot(
        caller,
        cmd,
        engine.capabilities(),
        engine.spawner(),
        reporter,
    );
    debug!(pid = caller.pid, cmd, ?outcome, "sys_reboot handled");
}

pub fn do_sys_open(engine: &Engine, caller: &Caller, args: &EntryArgs) {
    let EntryArgs::Open { filename, .. } = args else {
        return mismatched("do_sys_open", args);
    };
    engine
        .reporter()
        .report(Category::FsRead, "do_sys_open", caller, || EventFields::Open {
            file: filename,
        });
}

pub fn sys_close(engine: &Engine, caller: &Caller, args: &EntryArgs) {
    let &EntryArgs::Close { fd } = args else {
        return mismatched("sys_close", args);
    };
    engine
        .reporter()
        .report(Category::FsRead, "sys_close", caller, || EventFields::Close { fd });
}

/// Counts toward the recovery trigger, then writes the System line and the
/// analyze line
pub fn do_execve(engine: &Engine, caller: &Caller, args: &EntryArgs) {
    let EntryArgs::Execve { argv, envp, .. } = args else {
        return mismatched("do_execve", args);
    };
    let reporter = engine.reporter();

    engine.execute().on_entry(engine.spawner(), reporter);

    let max = engine.max_arg_strings();
    let argv = bounded(argv, max);
    let envp = bounded(envp, max);

    if !is_khelper(caller) {
        reporter.report(Category::System, "do_execve", caller, || {
            EventFields::Execve { argv, envp }
        });
    }

    if reporter.is_enabled(Category::Analyze) && engine.analyze().admits(caller, argv) {
        reporter.report(Category::Analyze, "do_execve", caller, || {
            EventFields::Analyze { argv, envp }
        });
    }
}

pub fn do_fork(engine: &Engine, caller: &Caller, args: &EntryArgs) {
    let &EntryArgs::Fork {
        clone_flags,
        stack_size,
        ..
    } = args
    else {
        return mismatched("do_fork", args);
    };
    if is_khelper(caller) {
        return;
    }
    engine
        .reporter()
        .report(Category::Exec, "do_fork", caller, || EventFields::Fork {
            clone_flags,
            stack_size,
        });
}

pub fn do_fork_ret(engine: &Engine, caller: &Caller, ret: &ExitArgs) {
    if is_khelper(caller) {
        return;
    }
    engine
        .reporter()
        .report(Category::Exec, "do_fork", caller, || EventFields::ForkReturn {
            retval: ret.retval,
        });
}

pub fn do_exit(engine: &Engine, caller: &Caller, args: &EntryArgs) {
    let &EntryArgs::Exit { code } = args else {
        return mismatched("do_exit", args);
    };
    if is_khelper(caller) {
        return;
    }
    engine
        .reporter()
        .report(Category::Exec, "do_exit", caller, || EventFields::Exit { code });
}

pub fn do_send_sig_info(engine: &Engine, caller: &Caller, args: &EntryArgs) {
    let &EntryArgs::Signal {
        sig, target_pid, ..
    } = args
    else {
        return mismatched("do_send_sig_info", args);
    };
    engine
        .reporter()
        .report(Category::Exec, "do_send_sig_info", caller, || {
            EventFields::Signal {
                target_pid,
                signal: sig,
            }
        });
}

/// Only executable mappings are of interest
pub fn mmap_region(engine: &Engine, caller: &Caller, args: &EntryArgs) {
    let EntryArgs::Mmap {
        file,
        addr,
        len,
        vm_flags,
        ..
    } = args
    else {
        return mismatched("mmap_region", args);
    };
    if vm_flags & VM_EXEC == 0 {
        return;
    }
    engine
        .reporter()
        .report(Category::Exec, "mmap_region", caller, || EventFields::Mmap {
            start: *addr,
            end: addr.wrapping_add(*len),
            file: file.as_deref(),
        });
}
