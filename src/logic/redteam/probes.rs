//! The probes. One per enforcement category, each named after the escape
//! vector it attempts, plus host-configuration observations that affect how
//! much a kernel hook can rely on the platform.
//!
//! Enforcement probes drive the same decision path the kernel hooks call:
//! the verdict is `Pass` exactly when the engine denies the operation for
//! the quarantined pid. Exercising the real syscalls requires the hook
//! mechanism to be installed, which is outside this core; the decision
//! surface is what this crate owns and what these probes pin down.

use std::path::Path;

use crate::logic::engine::Engine;
use crate::logic::policy::OpCategory;

use super::{ProbeReport, Verdict};

// ============================================================================
// ENFORCEMENT PROBES
// ============================================================================

/// (probe name, category) pairs. Names describe the attempted escape.
const ENFORCEMENT_PROBES: [(&str, OpCategory); 18] = [
    ("exfil_tcp_connect", OpCategory::NetConnect),
    ("exfil_udp_sendto_raw", OpCategory::NetSendTo),
    ("tamper_protected_write", OpCategory::FsWrite),
    ("tamper_truncate_log", OpCategory::FsTruncate),
    ("tamper_append_cron", OpCategory::FsAppend),
    ("tamper_rename_over_binary", OpCategory::FsRename),
    ("tamper_hardlink_escape", OpCategory::FsHardLink),
    ("priv_mount_overlay", OpCategory::Mount),
    ("spy_read_proc_maps", OpCategory::ProcMemRead),
    ("spy_read_proc_fd_table", OpCategory::ProcFdRead),
    ("hijack_ptrace_attach", OpCategory::PtraceAttach),
    ("covert_sysv_shm", OpCategory::ShmCreate),
    ("covert_msg_queue", OpCategory::MsgQueueCreate),
    ("covert_semaphore", OpCategory::SemCreate),
    ("covert_shared_mmap", OpCategory::SharedMmap),
    ("covert_unix_bind", OpCategory::UnixBind),
    ("covert_unix_connect", OpCategory::UnixConnect),
    ("covert_unix_dgram", OpCategory::UnixSendTo),
];

/// Attempt every enumerated escape vector for `pid` and report whether the
/// decision surface holds.
pub fn enforcement_probes(engine: &Engine, pid: u32) -> Vec<ProbeReport> {
    ENFORCEMENT_PROBES
        .iter()
        .map(|&(name, category)| {
            let decision = engine.decide(pid, category);
            if decision.allow {
                ProbeReport {
                    name,
                    category: Some(category),
                    verdict: Verdict::Finding,
                    detail: format!("{} was ALLOWED for pid {}", category, pid),
                }
            } else {
                ProbeReport {
                    name,
                    category: Some(category),
                    verdict: Verdict::Pass,
                    detail: format!("denied: {}", decision.reason),
                }
            }
        })
        .collect()
}

// ============================================================================
// HOST CONFIGURATION PROBES
// ============================================================================

/// Observations about the host that change what an installed hook can count
/// on. Always informational; there is no correct universal value.
pub fn host_config_probes() -> Vec<ProbeReport> {
    vec![
        probe_ptrace_scope(),
        probe_proc_hidepid(),
        probe_unprivileged_userns(),
    ]
}

fn read_sysctl(path: &str) -> Option<String> {
    std::fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

/// yama ptrace_scope: 0 permits same-uid attach even without our hooks.
fn probe_ptrace_scope() -> ProbeReport {
    let detail = match read_sysctl("/proc/sys/kernel/yama/ptrace_scope") {
        Some(v) => format!("kernel.yama.ptrace_scope = {}", v),
        None => "yama not present on this host".to_string(),
    };
    ProbeReport {
        name: "host_ptrace_scope",
        category: None,
        verdict: Verdict::Info,
        detail,
    }
}

/// /proc hidepid mount option hides other processes' entries from
/// unprivileged readers, independently of our enforcement.
fn probe_proc_hidepid() -> ProbeReport {
    let detail = match std::fs::read_to_string("/proc/mounts") {
        Ok(mounts) => match mounts
            .lines()
            .find(|l| l.starts_with("proc ") && l.contains("hidepid"))
        {
            Some(line) => format!("/proc mounted with hidepid: {}", line),
            None => "/proc mounted without hidepid".to_string(),
        },
        Err(e) => format!("/proc/mounts unreadable: {}", e),
    };
    ProbeReport {
        name: "host_proc_hidepid",
        category: None,
        verdict: Verdict::Info,
        detail,
    }
}

/// Unprivileged user namespaces widen the mount attack surface.
fn probe_unprivileged_userns() -> ProbeReport {
    let path = "/proc/sys/kernel/unprivileged_userns_clone";
    let detail = if Path::new(path).exists() {
        match read_sysctl(path) {
            Some(v) => format!("kernel.unprivileged_userns_clone = {}", v),
            None => "unprivileged_userns_clone unreadable".to_string(),
        }
    } else {
        "unprivileged_userns_clone knob not present (distro default applies)".to_string()
    };
    ProbeReport {
        name: "host_unprivileged_userns",
        category: None,
        verdict: Verdict::Info,
        detail,
    }
}

// ============================================================================
// TESTS
// ============================================================================
