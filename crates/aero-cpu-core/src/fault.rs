use bitflags::bitflags;

use crate::state::CpuState;

/// Exception kinds this implementation is able to classify. Kinds not
/// listed here (MC, VE, SX, CSO, TS, MF, XM) are out of scope: an opcode
/// naming one of them in its fault-set is never reported as faulting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Device-not-available: no x87/SSE unit, or it is marked task-switched.
    Nm,
    /// Segment-not-present.
    Np,
    /// Stack-segment fault.
    Ss,
    /// General protection.
    Gp,
    /// Page fault.
    Pf,
    /// Alignment check.
    Ac,
    /// Debug (matched a linear breakpoint).
    Db,
}

bitflags! {
    /// The set of fault kinds a given opcode may raise, consulted by the
    /// classifier in a fixed, documented order (see DESIGN.md): NM, NP, SS,
    /// GP, PF, AC, DB. The first kind in that order whose policy fires wins;
    /// the others are not evaluated.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FaultSet: u16 {
        const NM = 1 << 0;
        const NP = 1 << 1;
        const SS = 1 << 2;
        const GP = 1 << 3;
        const PF = 1 << 4;
        const AC = 1 << 5;
        const DB = 1 << 6;
    }
}

impl FaultSet {
    /// The fault-set shared by every general-purpose memory read/write in
    /// this implementation: segment-limit and stack-segment checks, plus
    /// whatever paging/alignment/debug state is active.
    pub fn memory_access() -> Self {
        FaultSet::SS | FaultSet::GP | FaultSet::PF | FaultSet::AC | FaultSet::DB
    }

    /// The fault-set for opcodes that touch the x87/SSE register file.
    pub fn fpu_access() -> Self {
        Self::memory_access() | FaultSet::NM | FaultSet::NP
    }
}

/// Evaluates `candidates` against `state` for a memory reference at `addr`,
/// returning the first applicable fault kind, if any.
pub fn classify(state: &CpuState, addr: u64, is_stack_ref: bool, candidates: FaultSet) -> Option<FaultKind> {
    let protected = state.control.cr0.contains(crate::control::Cr0::PE);

    if candidates.contains(FaultSet::NM)
        && (state.control.cr0.contains(crate::control::Cr0::EM) || state.control.cr0.contains(crate::control::Cr0::TS))
    {
        return Some(FaultKind::Nm);
    }

    if protected {
        if candidates.contains(FaultSet::NP) && !state.segments.cs.present() {
            return Some(FaultKind::Np);
        }

        if candidates.contains(FaultSet::SS) && is_stack_ref {
            let ss = &state.segments.ss;
            let within = addr >= ss.base && addr <= ss.base + ss.limit as u64;
            if within && !ss.writable() {
                return Some(FaultKind::Ss);
            }
        }

        if candidates.contains(FaultSet::GP) && addr > state.segments.cs.limit as u64 {
            return Some(FaultKind::Gp);
        }

        if candidates.contains(FaultSet::PF) && state.control.cr0.contains(crate::control::Cr0::PG) {
            // No page tables are modelled; the only representable failure
            // is an address outside the configured linear space.
            if addr >= state.linear_space_limit {
                return Some(FaultKind::Pf);
            }
        }

        if candidates.contains(FaultSet::AC)
            && state.control.cr0.contains(crate::control::Cr0::AM)
            && state.rflags.contains(crate::rflags::Rflags::AC)
            && addr % 4 != 0
        {
            return Some(FaultKind::Ac);
        }
    }

    if candidates.contains(FaultSet::DB) && state.debug.breakpoint_matches(addr) {
        return Some(FaultKind::Db);
    }

    None
}
