use aero_cpu_decoder::{
    decode_modrm, InstructionStream, ModRmDescriptor, OperandKind, Prefixes, RegRef, RmTarget, Width,
};
use aero_mem::Memory;

use crate::fault::{classify, FaultKind, FaultSet};
use crate::operand::{pick_segment, resolve_linear_address, SegmentPick};
use crate::state::CpuState;

/// Execution state of the step loop's outer state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Halted,
}

/// Owns the architectural state and the flat memory it operates over, and
/// drives the fetch/decode/execute loop.
pub struct Cpu {
    pub state: CpuState,
    pub mem: Memory,
    pub run_state: RunState,
    /// The opcode byte most recently dispatched, recorded by the step loop
    /// before calling the handler so diagnostics don't need to re-read
    /// memory through a possibly-stale `IP`.
    pub last_opcode: u8,
    /// Set by each handler to the disassembled text of the instruction it
    /// just executed; the CLI front end prints this once per step.
    pub last_disasm: Option<String>,
}

impl Cpu {
    pub fn new(mem: Memory) -> Self {
        Cpu {
            state: CpuState::reset(),
            mem,
            run_state: RunState::Running,
            last_opcode: 0,
            last_disasm: None,
        }
    }

    pub fn halt(&mut self, reason: &str) {
        tracing::warn!(reason, "CPU halted");
        self.run_state = RunState::Halted;
    }

    pub fn is_running(&self) -> bool {
        self.run_state == RunState::Running
    }

    /// Fetches the ModR/M (+ SIB + displacement) for the instruction at the
    /// current IP, using `kind` as the nominal operand width.
    pub fn fetch_modrm(&mut self, prefixes: &Prefixes, kind: OperandKind) -> ModRmDescriptor {
        let mode = self.state.mode();
        decode_modrm(self, mode, prefixes, kind)
    }

    pub fn read_reg(&self, reg: RegRef) -> u64 {
        self.state.regs.get(reg)
    }

    pub fn write_reg(&mut self, reg: RegRef, value: u64) {
        self.state.regs.set(reg, value)
    }

    fn linear_address(&self, rm: &ModRmDescriptor, prefixes: &Prefixes, default_seg: SegmentPick) -> u64 {
        match rm.rm {
            RmTarget::Memory(ea) => {
                let seg = pick_segment(&self.state.segments, default_seg, prefixes.segment);
                resolve_linear_address(&ea, seg.base, |r| self.read_reg(r))
            }
            RmTarget::Register(_) => unreachable!("linear_address called on a register operand"),
        }
    }

    /// Reads the rm operand of a decoded ModR/M, honouring the fault
    /// classifier for memory operands. Returns `None` if a fault fired
    /// (the caller must not commit any further effect of the instruction).
    pub fn read_rm(&mut self, rm: &ModRmDescriptor, prefixes: &Prefixes, default_seg: SegmentPick, width: Width) -> Option<u64> {
        match rm.rm {
            RmTarget::Register(r) => Some(self.read_reg(r)),
            RmTarget::Memory(_) => {
                let addr = self.linear_address(rm, prefixes, default_seg);
                if self.check_fault(addr, default_seg == SegmentPick::Ss) {
                    return None;
                }
                Some(self.read_memory(addr, width))
            }
        }
    }

    pub fn write_rm(&mut self, rm: &ModRmDescriptor, prefixes: &Prefixes, default_seg: SegmentPick, width: Width, value: u64) -> bool {
        match rm.rm {
            RmTarget::Register(r) => {
                self.write_reg(r, value);
                true
            }
            RmTarget::Memory(_) => {
                let addr = self.linear_address(rm, prefixes, default_seg);
                if self.check_fault(addr, default_seg == SegmentPick::Ss) {
                    return false;
                }
                self.write_memory(addr, width, value);
                true
            }
        }
    }

    fn check_fault(&mut self, addr: u64, is_stack_ref: bool) -> bool {
        if let Some(kind) = classify(&self.state, addr, is_stack_ref, FaultSet::memory_access()) {
            self.report_fault(kind, addr);
            true
        } else {
            false
        }
    }

    fn report_fault(&mut self, kind: FaultKind, addr: u64) {
        tracing::debug!(?kind, addr, "architectural fault suppressed commit");
        self.halt(&format!("unhandled fault {kind:?} at {addr:#x}"));
    }

    pub fn read_memory(&self, addr: u64, width: Width) -> u64 {
        match width {
            Width::W8 => self.mem.read(addr) as u64,
            Width::W16 => self.mem.read_u16(addr) as u64,
            Width::W32 => self.mem.read_u32(addr) as u64,
            Width::W64 => self.mem.read_u64(addr),
        }
    }

    pub fn write_memory(&mut self, addr: u64, width: Width, value: u64) {
        match width {
            Width::W8 => self.mem.write(addr, value as u8),
            Width::W16 => self.mem.write_u16(addr, value as u16),
            Width::W32 => self.mem.write_u32(addr, value as u32),
            Width::W64 => self.mem.write_u64(addr, value),
        }
    }

    pub fn fetch_imm(&mut self, width: Width) -> u64 {
        match width {
            Width::W8 => self.fetch_u8() as u64,
            Width::W16 => self.fetch_u16() as u64,
            Width::W32 => self.fetch_u32() as u64,
            Width::W64 => self.fetch_u64(),
        }
    }
}

impl InstructionStream for Cpu {
    fn fetch_u8(&mut self) -> u8 {
        let addr = self.state.program_counter();
        let b = self.mem.read(addr);
        self.state.regs.ip = self.state.regs.ip.wrapping_add(1);
        b
    }

    fn ip(&self) -> u64 {
        self.state.regs.ip
    }
}
