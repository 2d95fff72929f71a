use aero_cpu_decoder::CpuMode;

use crate::control::{ControlRegisters, Cr0};
use crate::debug_regs::DebugRegisters;
use crate::regs::RegisterFile;
use crate::rflags::Rflags;
use crate::segments::{SegmentFile, SystemTables};

/// Every piece of architectural state a handler or the fault classifier can
/// observe or mutate. Owned by [`crate::cpu::Cpu`] for the lifetime of the
/// machine.
#[derive(Debug, Clone)]
pub struct CpuState {
    pub regs: RegisterFile,
    pub segments: SegmentFile,
    pub tables: SystemTables,
    pub control: ControlRegisters,
    pub debug: DebugRegisters,
    pub rflags: Rflags,
    /// Upper bound of the linear address space the paging-fault policy
    /// checks against. Not architectural state proper; configured once at
    /// construction to size the #PF check in `fault::classify`.
    pub linear_space_limit: u64,
}

impl CpuState {
    /// The power-on reset state: GPRs zero, `IP = 0xFFF0`, `CS` based at the
    /// top of the 32-bit address space so that `CS.base + IP ==
    /// 0xFFFFFFF0`, segments otherwise at their defaults, `CR0` with only
    /// `ET`/`MP`/`NE` set, `DR6`/`DR7` at their architectural reset values.
    pub fn reset() -> Self {
        let mut regs = RegisterFile::new();
        regs.ip = 0xFFF0;
        CpuState {
            regs,
            segments: SegmentFile::reset(),
            tables: SystemTables::default(),
            control: ControlRegisters {
                cr0: Cr0::default(),
                ..ControlRegisters::default()
            },
            debug: DebugRegisters::default(),
            rflags: Rflags::reset(),
            linear_space_limit: 1u64 << 32,
        }
    }

    /// The instruction's logical program counter: `CS.base + IP`, truncated
    /// the way a real address computation would be.
    pub fn program_counter(&self) -> u64 {
        self.segments.cs.base.wrapping_add(self.regs.ip)
    }

    /// Derives the decoder's addressing mode from `CR0.PE` and `EFER.LMA`.
    /// Long mode (and therefore REX availability) requires both paging and
    /// the long-mode-active bit, matching how a real CPU only activates
    /// 64-bit operation once it has entered paged protected mode with
    /// `EFER.LME` set.
    pub fn mode(&self) -> CpuMode {
        if !self.control.cr0.contains(Cr0::PE) {
            CpuMode::Real16
        } else if self.control.efer.contains(crate::control::Efer::LMA) {
            CpuMode::Long64
        } else {
            CpuMode::Protected32
        }
    }
}
