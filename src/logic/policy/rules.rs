//! Policy tables - per-state allow/deny matrix.
//!
//! The ladder tightens monotonically: anything denied at a state stays
//! denied at every higher state. QUARANTINED enumerates a denial for every
//! category; there is deliberately no wildcard arm for it, so adding a new
//! `OpCategory` without deciding its quarantine behavior fails to compile.

use super::{deny, Decision, OpCategory, ALLOW};
use crate::logic::state::IsolationState;

/// Lookup the policy table. Pure and allocation-free.
pub fn lookup(category: OpCategory, state: IsolationState) -> Decision {
    match state {
        // Unconfined and watch-only states permit everything; OBSERVED is
        // a scoring posture, not an enforcement posture.
        IsolationState::Normal | IsolationState::Observed => ALLOW,

        // RESTRICTED cuts off cross-process inspection and mount surface.
        IsolationState::Restricted => match category {
            OpCategory::Mount => deny("restricted: mount denied"),
            OpCategory::PtraceAttach => deny("restricted: ptrace denied"),
            OpCategory::ProcMemRead => deny("restricted: process memory read denied"),
            OpCategory::ProcFdRead => deny("restricted: fd table read denied"),
            _ => ALLOW,
        },

        // ISOLATED additionally severs network and shared IPC.
        IsolationState::Isolated => match category {
            OpCategory::Mount => deny("isolated: mount denied"),
            OpCategory::PtraceAttach => deny("isolated: ptrace denied"),
            OpCategory::ProcMemRead => deny("isolated: process memory read denied"),
            OpCategory::ProcFdRead => deny("isolated: fd table read denied"),
            OpCategory::NetConnect => deny("isolated: outbound connect denied"),
            OpCategory::NetSendTo => deny("isolated: datagram send denied"),
            OpCategory::UnixBind => deny("isolated: unix bind denied"),
            OpCategory::UnixConnect => deny("isolated: unix connect denied"),
            OpCategory::UnixSendTo => deny("isolated: unix datagram denied"),
            OpCategory::ShmCreate => deny("isolated: shared memory denied"),
            OpCategory::MsgQueueCreate => deny("isolated: message queue denied"),
            OpCategory::SemCreate => deny("isolated: semaphore denied"),
            OpCategory::SharedMmap => deny("isolated: shared mapping denied"),
            OpCategory::FsWrite
            | OpCategory::FsTruncate
            | OpCategory::FsAppend
            | OpCategory::FsRename
            | OpCategory::FsHardLink => ALLOW,
        },

        // QUARANTINED: full table, every category denied.
        IsolationState::Quarantined => match category {
            OpCategory::NetConnect => deny("quarantine: outbound connect denied"),
            OpCategory::NetSendTo => deny("quarantine: datagram send denied"),
            OpCategory::FsWrite => deny("quarantine: protected write denied"),
            OpCategory::FsTruncate => deny("quarantine: truncate denied"),
            OpCategory::FsAppend => deny("quarantine: append denied"),
            OpCategory::FsRename => deny("quarantine: rename denied"),
            OpCategory::FsHardLink => deny("quarantine: hard link denied"),
            OpCategory::Mount => deny("quarantine: mount denied"),
            OpCategory::ProcMemRead => deny("quarantine: process memory read denied"),
            OpCategory::ProcFdRead => deny("quarantine: fd table read denied"),
            OpCategory::PtraceAttach => deny("quarantine: ptrace denied"),
            OpCategory::ShmCreate => deny("quarantine: shared memory denied"),
            OpCategory::MsgQueueCreate => deny("quarantine: message queue denied"),
            OpCategory::SemCreate => deny("quarantine: semaphore denied"),
            OpCategory::SharedMmap => deny("quarantine: shared mapping denied"),
            OpCategory::UnixBind => deny("quarantine: unix bind denied"),
            OpCategory::UnixConnect => deny("quarantine: unix connect denied"),
            OpCategory::UnixSendTo => deny("quarantine: unix datagram denied"),
        },
    }
}

// ============================================================================
// TESTS
// ============================================================================
