//! Recording fakes shared by the integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use hookwatch_agent::host::sink::MemorySink;
use hookwatch_agent::host::{
    CapMask, CapabilityError, CapabilityFacility, CapabilitySets, Credentials, HostError,
    ProcessSpawner, SocketResolver,
};
use hookwatch_agent::{Config, Engine, EntryArgs};
use hookwatch_shared::{Caller, Pid};

/// One recorded spawn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spawned {
    pub path: String,
    pub argv: Vec<String>,
    pub envp: Vec<String>,
}

#[derive(Default)]
pub struct RecordingSpawner {
    calls: Mutex<Vec<Spawned>>,
}

impl RecordingSpawner {
    pub fn calls(&self) -> Vec<Spawned> {
        self.calls.lock().unwrap().clone()
    }
}

impl ProcessSpawner for RecordingSpawner {
    fn spawn(&self, path: &str, argv: &[String], envp: &[String]) -> Result<(), HostError> {
        self.calls.lock().unwrap().push(Spawned {
            path: path.to_string(),
            argv: argv.to_vec(),
            envp: envp.to_vec(),
        });
        Ok(())
    }
}

/// Capability facility with switchable failures
#[derive(Default)]
pub struct FakeCapabilities {
    pub fail_read: bool,
    pub fail_prepare: bool,
    pub fail_set: bool,
    pub fail_commit: bool,
    pub committed_creds: Mutex<Vec<Credentials>>,
    pub abort_count: Mutex<usize>,
}

impl FakeCapabilities {
    pub fn committed(&self) -> Vec<Credentials> {
        self.committed_creds.lock().unwrap().clone()
    }

    pub fn aborted(&self) -> usize {
        *self.abort_count.lock().unwrap()
    }
}

fn full_sets() -> CapabilitySets {
    let all = CapMask((1u64 << 41) - 1);
    CapabilitySets {
        effective: all,
        inheritable: CapMask(0),
        permitted: all,
    }
}

impl CapabilityFacility for FakeCapabilities {
    fn capget(&self, _caller: &Caller) -> Result<CapabilitySets, CapabilityError> {
        if self.fail_read {
            return Err(CapabilityError::Read("EPERM".to_string()));
        }
        Ok(full_sets())
    }

    fn prepare(&self, caller: &Caller) -> Result<Credentials, CapabilityError> {
        if self.fail_prepare {
            return Err(CapabilityError::Prepare("ENOMEM".to_string()));
        }
        Ok(Credentials {
            pid: caller.pid,
            sets: full_sets(),
        })
    }

    fn capset(
        &self,
        new: &mut Credentials,
        reference: &CapabilitySets,
        sets: CapabilitySets,
    ) -> Result<(), CapabilityError> {
        if self.fail_set {
            return Err(CapabilityError::Set("EPERM".to_string()));
        }
        reference.permits(&sets)?;
        new.sets = sets;
        Ok(())
    }

    fn commit(&self, new: Credentials) -> Result<(), CapabilityError> {
        if self.fail_commit {
            return Err(CapabilityError::Commit("EPERM".to_string()));
        }
        self.committed_creds.lock().unwrap().push(new);
        Ok(())
    }

    fn abort(&self, _new: Credentials) {
        *self.abort_count.lock().unwrap() += 1;
    }
}

/// Socket table keyed by (pid, fd)
#[derive(Default)]
pub struct StaticSockets {
    ports: HashMap<(Pid, i32), u16>,
}

impl StaticSockets {
    pub fn with(mut self, pid: Pid, fd: i32, port: u16) -> Self {
        self.ports.insert((pid, fd), port);
        self
    }
}

impl SocketResolver for StaticSockets {
    fn bound_port(&self, pid: Pid, fd: i32) -> Option<u16> {
        self.ports.get(&(pid, fd)).copied()
    }
}

/// Engine plus handles on every fake it was built with
pub struct Harness {
    pub engine: Engine,
    pub sink: Arc<MemorySink>,
    pub spawner: Arc<RecordingSpawner>,
    pub caps: Arc<FakeCapabilities>,
}

pub fn harness(config: &Config) -> Harness {
    harness_with(config, FakeCapabilities::default(), StaticSockets::default())
}

pub fn harness_with(config: &Config, caps: FakeCapabilities, sockets: StaticSockets) -> Harness {
    let sink = Arc::new(MemorySink::new());
    let spawner = Arc::new(RecordingSpawner::default());
    let caps = Arc::new(caps);
    let engine = Engine::builder(config)
        .sink(sink.clone())
        .spawner(spawner.clone())
        .capabilities(caps.clone())
        .sockets(Arc::new(sockets))
        .build();
    Harness {
        engine,
        sink,
        spawner,
        caps,
    }
}

/// Arguments that make `symbol` emit exactly one line when its category is
/// enabled
pub fn sample_args(symbol: &str) -> EntryArgs {
    match symbol {
        "inet_bind" => EntryArgs::InetBind {
            sock_type: 1,
            port: 80,
        },
        "sys_bind" => EntryArgs::Bind {
            fd: 3,
            family: 2,
            port: 80,
        },
        "inet6_bind" => EntryArgs::Inet6Bind {
            sock_type: 2,
            port: 53,
        },
        "inet_accept" => EntryArgs::Accept { flags: 0 },
        "register_vlan_dev" => EntryArgs::RegisterVlan {
            dev: "eth0.2".to_string(),
            vlan_id: 2,
        },
        "__inet_insert_ifa" => EntryArgs::InsertIfa {
            device: "br0".to_string(),
            address: 0x0101_a8c0,
        },
        "br_add_if" => EntryArgs::BridgeAddIf {
            bridge: "br0".to_string(),
            dev: "eth0".to_string(),
        },
        "sys_socket" => EntryArgs::Socket {
            family: 2,
            sock_type: 1,
            protocol: 0,
        },
        "sys_setsockopt" => EntryArgs::SetSockOpt {
            fd: 3,
            level: 1,
            optname: 2,
        },
        "do_mount" => EntryArgs::Mount {
            dev_name: Some("proc".to_string()),
            dir_name: Some("/proc".to_string()),
            fs_type: Some("proc".to_string()),
            flags: 0,
        },
        "vfs_mknod" => EntryArgs::Mknod {
            file: "mtdblock0".to_string(),
            dev: (31 << 20),
        },
        "vfs_unlink" => EntryArgs::Unlink {
            file: "lock".to_string(),
        },
        "do_vfs_ioctl" => EntryArgs::Ioctl {
            cmd: 0x8914,
            arg: 0x7fff_0000,
        },
        "sys_reboot" => EntryArgs::Reboot {
            magic1: 0xfee1_dead,
            magic2: 0x2812_1969,
            cmd: 0x0123_4567,
        },
        "do_sys_open" => EntryArgs::Open {
            filename: "/etc/passwd".to_string(),
            flags: 0,
            mode: 0,
        },
        "sys_close" => EntryArgs::Close { fd: 3 },
        "do_execve" => EntryArgs::Execve {
            filename: "/bin/ls".to_string(),
            argv: vec!["ls".to_string(), "/tmp".to_string()],
            envp: vec!["PATH=/bin".to_string()],
        },
        "do_fork" => EntryArgs::Fork {
            clone_flags: 0x11,
            stack_start: 0,
            stack_size: 0,
        },
        "do_exit" => EntryArgs::Exit { code: 0 },
        "do_send_sig_info" => EntryArgs::Signal {
            sig: 15,
            target_pid: 42,
            group: false,
        },
        "mmap_region" => EntryArgs::Mmap {
            file: Some("libc.so.0".to_string()),
            addr: 0x4000_0000,
            len: 0x1000,
            vm_flags: 0x5,
            pgoff: 0,
        },
        other => panic!("no sample arguments for {}", other),
    }
}
