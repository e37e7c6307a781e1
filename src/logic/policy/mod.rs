//! Enforcement Policy
//!
//! Pure decision surface consumed synchronously by kernel-level hooks.
//! `decide` is a function of (operation category, state) only: no I/O, no
//! locks, no allocation, no hidden mutable state. It runs inside a hook
//! context with a strict time budget, so any internal failure must resolve
//! to deny (fail-closed) rather than attempt recovery there.

pub mod rules;

use serde::{Deserialize, Serialize};

use crate::logic::state::IsolationState;

// ============================================================================
// OPERATION CATEGORIES
// ============================================================================

/// Every class of intercepted operation the hook layer can ask about.
/// One red-team probe exists per variant; keep the two in lockstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpCategory {
    /// Outbound connection on an inet socket (connect path, any transport)
    NetConnect,
    /// Datagram send, including raw/low-level sendto paths
    NetSendTo,
    /// Filesystem write to a protected path
    FsWrite,
    /// Truncation of a protected path
    FsTruncate,
    /// Append to a protected path
    FsAppend,
    /// Rename targeting a protected path
    FsRename,
    /// Hard-link creation targeting a protected path
    FsHardLink,
    /// mount-class operations
    Mount,
    /// Reading another process's memory maps
    ProcMemRead,
    /// Reading another process's file-descriptor table
    ProcFdRead,
    /// ptrace-attach to any other process
    PtraceAttach,
    /// System-V / POSIX shared memory creation or attachment
    ShmCreate,
    /// Message queue creation or attachment
    MsgQueueCreate,
    /// Semaphore creation or attachment
    SemCreate,
    /// Memory-mapped shared region via anonymous/shared fd
    SharedMmap,
    /// Unix-domain socket bind
    UnixBind,
    /// Unix-domain socket connect
    UnixConnect,
    /// Unix-domain datagram send
    UnixSendTo,
}

/// All categories, for table-driven tests and the red-team harness.
pub const ALL_CATEGORIES: [OpCategory; 18] = [
    OpCategory::NetConnect,
    OpCategory::NetSendTo,
    OpCategory::FsWrite,
    OpCategory::FsTruncate,
    OpCategory::FsAppend,
    OpCategory::FsRename,
    OpCategory::FsHardLink,
    OpCategory::Mount,
    OpCategory::ProcMemRead,
    OpCategory::ProcFdRead,
    OpCategory::PtraceAttach,
    OpCategory::ShmCreate,
    OpCategory::MsgQueueCreate,
    OpCategory::SemCreate,
    OpCategory::SharedMmap,
    OpCategory::UnixBind,
    OpCategory::UnixConnect,
    OpCategory::UnixSendTo,
];

impl OpCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpCategory::NetConnect => "net.connect",
            OpCategory::NetSendTo => "net.sendto",
            OpCategory::FsWrite => "fs.write",
            OpCategory::FsTruncate => "fs.truncate",
            OpCategory::FsAppend => "fs.append",
            OpCategory::FsRename => "fs.rename",
            OpCategory::FsHardLink => "fs.hardlink",
            OpCategory::Mount => "mount",
            OpCategory::ProcMemRead => "proc.mem_read",
            OpCategory::ProcFdRead => "proc.fd_read",
            OpCategory::PtraceAttach => "ptrace.attach",
            OpCategory::ShmCreate => "ipc.shm",
            OpCategory::MsgQueueCreate => "ipc.msgqueue",
            OpCategory::SemCreate => "ipc.semaphore",
            OpCategory::SharedMmap => "ipc.shared_mmap",
            OpCategory::UnixBind => "unix.bind",
            OpCategory::UnixConnect => "unix.connect",
            OpCategory::UnixSendTo => "unix.sendto",
        }
    }
}

impl std::fmt::Display for OpCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// DECISION
// ============================================================================

/// Allow or deny, with a static reason code for the audit path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allow: bool,
    pub reason: &'static str,
}

pub const ALLOW: Decision = Decision { allow: true, reason: "allowed" };

/// The fail-closed fallback when the decision path itself misbehaves.
pub const DENY_INTERNAL: Decision = Decision {
    allow: false,
    reason: "internal error: fail closed",
};

pub const fn deny(reason: &'static str) -> Decision {
    Decision { allow: false, reason }
}

/// The enforcement decision function. Pure; see `rules` for the table.
/// `pid` is carried for the hook contract and audit trail; the verdict
/// depends only on (category, state).
pub fn decide(pid: u32, category: OpCategory, state: IsolationState) -> Decision {
    let _ = pid;
    rules::lookup(category, state)
}

/// Hook-boundary wrapper: a panic in the decision path resolves to deny in
/// unwinding builds, and aborts the process under `panic = "abort"`. Either
/// way enforcement never fails open. The primary guarantee is structural:
/// `rules::lookup` is a total, panic-free match over (category, state).
pub fn decide_checked(pid: u32, category: OpCategory, state: IsolationState) -> Decision {
    std::panic::catch_unwind(|| decide(pid, category, state)).unwrap_or(DENY_INTERNAL)
}

// ============================================================================
// TESTS
// ============================================================================
