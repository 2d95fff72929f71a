use aero_cpu_decoder::{InstructionStream, Prefixes};

use crate::cpu::{Cpu, RunState};
use crate::dispatch;

/// Executes one instruction: accumulates prefixes, dispatches the opcode,
/// and resets the prefix accumulator unless the handler signalled
/// passthrough. Returns `false` once the CPU has halted.
pub fn step(cpu: &mut Cpu) -> bool {
    if cpu.run_state == RunState::Halted {
        return false;
    }
    let mut prefixes = Prefixes::default();
    loop {
        let opcode = cpu.fetch_u8();
        cpu.last_opcode = opcode;
        let handler = dispatch::primary()[opcode as usize];
        let continue_prefix = handler(cpu, &mut prefixes);
        tracing::trace!(opcode, ip = cpu.state.regs.ip, "dispatched");
        if !continue_prefix {
            break;
        }
        if cpu.run_state == RunState::Halted {
            return false;
        }
    }
    cpu.run_state == RunState::Running
}

/// Runs until halted or `max_steps` instructions have committed, whichever
/// comes first. Returns the number of instructions executed.
pub fn run(cpu: &mut Cpu, max_steps: u64) -> u64 {
    let mut executed = 0;
    while executed < max_steps && step(cpu) {
        executed += 1;
    }
    executed
}

#[cfg(test)]
mod tests {
    use super::*;
    use aero_mem::Memory;

    fn cpu_with_image(bytes: &[u8]) -> Cpu {
        let mut mem = Memory::new_4gib();
        let base = 0xFFFF_FFF0u64;
        for (i, b) in bytes.iter().enumerate() {
            mem.write(base + i as u64, *b);
        }
        Cpu::new(mem)
    }

    #[test]
    fn add_al_imm8_no_prefix() {
        let mut cpu = cpu_with_image(&[0x04, 0x05]);
        assert!(step(&mut cpu));
        assert_eq!(cpu.state.regs.get64(0) & 0xFF, 0x05);
        assert_eq!(cpu.state.regs.ip, 0xFFF2);
    }

    #[test]
    fn add_al_imm8_overflow() {
        // MOV AL,0x7F ; ADD AL,1
        let mut cpu = cpu_with_image(&[0xB0, 0x7F, 0x04, 0x01]);
        assert!(step(&mut cpu));
        assert!(step(&mut cpu));
        assert_eq!(cpu.state.regs.get64(0) & 0xFF, 0x80);
        assert!(cpu.state.rflags.contains(crate::rflags::Rflags::OF));
        assert!(cpu.state.rflags.contains(crate::rflags::Rflags::SF));
        assert!(!cpu.state.rflags.contains(crate::rflags::Rflags::CF));
    }

    #[test]
    fn add_al_imm8_carry() {
        // MOV AL,0xFF ; ADD AL,1
        let mut cpu = cpu_with_image(&[0xB0, 0xFF, 0x04, 0x01]);
        assert!(step(&mut cpu));
        assert!(step(&mut cpu));
        assert_eq!(cpu.state.regs.get64(0) & 0xFF, 0x00);
        assert!(cpu.state.rflags.contains(crate::rflags::Rflags::CF));
        assert!(cpu.state.rflags.contains(crate::rflags::Rflags::ZF));
        assert!(!cpu.state.rflags.contains(crate::rflags::Rflags::OF));
    }

    #[test]
    fn op_size_prefix_then_add_ax() {
        // 66 05 34 12 -> ADD AX, 0x1234. Real mode's default operand width
        // on this machine is 32-bit; 0x66 toggles it down to 16-bit.
        let mut cpu = cpu_with_image(&[0x66, 0x05, 0x34, 0x12, 0x00, 0x00]);
        assert!(step(&mut cpu));
        assert_eq!(cpu.state.regs.get64(0) & 0xFFFF, 0x1234);
        assert!(!cpu.state.rflags.contains(crate::rflags::Rflags::ZF));
        assert!(!cpu.state.rflags.contains(crate::rflags::Rflags::SF));
    }

    #[test]
    fn xor_self_zero_idiom() {
        // 31 DB -> XOR BX, BX in real mode
        let mut cpu = cpu_with_image(&[0x31, 0xDB]);
        cpu.state.regs.set64(3, 0x1234);
        assert!(step(&mut cpu));
        assert_eq!(cpu.state.regs.get64(3) & 0xFFFF, 0);
        assert!(cpu.state.rflags.contains(crate::rflags::Rflags::ZF));
        assert!(!cpu.state.rflags.contains(crate::rflags::Rflags::CF));
        assert!(!cpu.state.rflags.contains(crate::rflags::Rflags::OF));
    }

    #[test]
    fn short_backward_jmp_restores_ip() {
        // E9 FD FF at the reset vector: JMP rel16 -3, landing back at the
        // opcode byte itself.
        let mut cpu = cpu_with_image(&[0xE9, 0xFD, 0xFF]);
        let ip_before = cpu.state.regs.ip;
        assert!(step(&mut cpu));
        assert_eq!(cpu.state.regs.ip, ip_before);
    }

    #[test]
    fn unimplemented_opcode_halts() {
        let mut cpu = cpu_with_image(&[0xD6]); // SALC, not implemented
        assert!(!step(&mut cpu));
        assert_eq!(cpu.run_state, RunState::Halted);
    }

    #[test]
    fn hlt_halts() {
        let mut cpu = cpu_with_image(&[0xF4]);
        assert!(!step(&mut cpu));
        assert_eq!(cpu.run_state, RunState::Halted);
    }
}
