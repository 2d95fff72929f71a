//! Opcode handlers. Each has the signature `(cpu, prefixes) -> bool`, where
//! the returned `bool` is the "prefix passthrough" signal from the step
//! loop's contract: `true` means the byte just consumed was itself a
//! prefix and the accumulator must survive into the next iteration; `false`
//! means it was a genuine opcode and the loop resets the accumulator.
//!
//! Every handler that touches memory consults the fault classifier via
//! `Cpu::read_rm`/`Cpu::write_rm` before committing; a fault suppresses the
//! write and halts (see `Cpu::report_fault`), since this implementation does
//! not model an IDT to vector into instead.

use aero_cpu_decoder::{CpuMode, OperandKind, Prefixes, RegRef, Width};

use crate::alu;
use crate::cpu::Cpu;
use crate::disasm::{format_imm, format_rm, reg_name};
use crate::operand::SegmentPick;
use crate::regs::gpr;
use crate::rflags::Rflags;

pub type Handler = fn(&mut Cpu, &mut Prefixes) -> bool;

fn reg_ref(index: u8, width: Width) -> RegRef {
    RegRef {
        index,
        width,
        high_byte: false,
    }
}

pub fn unimplemented(cpu: &mut Cpu, _prefixes: &mut Prefixes) -> bool {
    let opcode = cpu.last_opcode;
    tracing::warn!(opcode, "unimplemented opcode");
    println!("UNIMPLEMENTED OPCODE {opcode:#04x}");
    cpu.halt("unimplemented opcode");
    false
}

fn unimplemented_0f(cpu: &mut Cpu, _prefixes: &mut Prefixes) -> bool {
    let second = cpu.fetch_u8();
    tracing::warn!(opcode = 0x0Fu16, second, "unimplemented two-byte opcode");
    println!("UNIMPLEMENTED OPCODE 0x0F {second:#04x}");
    cpu.halt("unimplemented two-byte opcode");
    false
}

/// Dispatches the `0x0F` extension table.
fn two_byte_escape(cpu: &mut Cpu, prefixes: &mut Prefixes) -> bool {
    let second = cpu.fetch_u8();
    let handler = crate::dispatch::secondary()[second as usize];
    handler(cpu, prefixes);
    false
}

macro_rules! alu_rm_reg_handler {
    ($name:ident, $op:path, $kind:expr, $reg_is_dest:expr, $mnemonic:literal) => {
        fn $name(cpu: &mut Cpu, prefixes: &mut Prefixes) -> bool {
            let rm = cpu.fetch_modrm(prefixes, $kind);
            let width = rm.reg.width;
            let reg = rm.reg;
            let rm_val = match cpu.read_rm(&rm, prefixes, SegmentPick::Ds, width) {
                Some(v) => v,
                None => return false,
            };
            let reg_val = cpu.read_reg(reg);
            let (dest_before, src) = if $reg_is_dest { (reg_val, rm_val) } else { (rm_val, reg_val) };
            let (result, flags) = $op(dest_before, src, width);
            cpu.state.rflags.merge_status(flags);
            let committed = if $reg_is_dest {
                cpu.write_reg(reg, result);
                true
            } else {
                cpu.write_rm(&rm, prefixes, SegmentPick::Ds, width, result)
            };
            if committed {
                let (dst_text, src_text) = if $reg_is_dest {
                    (reg_name(reg), format_rm(&rm, width))
                } else {
                    (format_rm(&rm, width), reg_name(reg))
                };
                cpu.last_disasm = Some(format!("{} {}, {}", $mnemonic, dst_text, src_text));
            }
            false
        }
    };
}

alu_rm_reg_handler!(add_rm8_r8, alu::add, OperandKind::Byte, false, "ADD");
alu_rm_reg_handler!(add_rm_r, alu::add, OperandKind::GprWidth, false, "ADD");
alu_rm_reg_handler!(add_r8_rm8, alu::add, OperandKind::Byte, true, "ADD");
alu_rm_reg_handler!(add_r_rm, alu::add, OperandKind::GprWidth, true, "ADD");

fn real_mode_only(cpu: &Cpu) -> bool {
    cpu.state.mode() == CpuMode::Real16
}

macro_rules! alu_rm_reg_real_mode_only {
    ($name:ident, $op:path, $mnemonic:literal) => {
        /// Only implemented for real mode (`!CR0.PE`); protected mode falls
        /// through to unimplemented rather than a real architectural
        /// restriction.
        fn $name(cpu: &mut Cpu, prefixes: &mut Prefixes) -> bool {
            if !real_mode_only(cpu) {
                return unimplemented(cpu, prefixes);
            }
            let rm = cpu.fetch_modrm(prefixes, OperandKind::GprWidth);
            let width = rm.reg.width;
            let reg = rm.reg;
            let dest_before = match cpu.read_rm(&rm, prefixes, SegmentPick::Ds, width) {
                Some(v) => v,
                None => return false,
            };
            let src = cpu.read_reg(reg);
            let (result, flags) = $op(dest_before, src, width);
            cpu.state.rflags.merge_status(flags);
            if cpu.write_rm(&rm, prefixes, SegmentPick::Ds, width, result) {
                cpu.last_disasm = Some(format!("{} {}, {}", $mnemonic, format_rm(&rm, width), reg_name(reg)));
            }
            false
        }
    };
}

alu_rm_reg_real_mode_only!(sub_rm_r, alu::sub, "SUB");
alu_rm_reg_real_mode_only!(xor_rm_r, alu::xor, "XOR");

fn add_al_imm8(cpu: &mut Cpu, _prefixes: &mut Prefixes) -> bool {
    let imm = cpu.fetch_imm(Width::W8);
    let dest = reg_ref(gpr::AX, Width::W8);
    let before = cpu.read_reg(dest);
    let (result, flags) = alu::add_u8(before as u8, imm as u8);
    cpu.state.rflags.merge_status(flags);
    cpu.write_reg(dest, result as u64);
    cpu.last_disasm = Some(format!("ADD AL, {}", format_imm(imm, Width::W8)));
    false
}

fn mov_al_imm8(cpu: &mut Cpu, _prefixes: &mut Prefixes) -> bool {
    let imm = cpu.fetch_imm(Width::W8);
    let dest = reg_ref(gpr::AX, Width::W8);
    cpu.write_reg(dest, imm);
    cpu.last_disasm = Some(format!("MOV AL, {}", format_imm(imm, Width::W8)));
    false
}

fn add_eax_imm(cpu: &mut Cpu, prefixes: &mut Prefixes) -> bool {
    let width = aero_cpu_decoder::operand_width(cpu.state.mode(), prefixes);
    let imm = match width {
        Width::W64 => cpu.fetch_imm(Width::W32) as i32 as i64 as u64,
        other => cpu.fetch_imm(other),
    };
    let dest = reg_ref(gpr::AX, width);
    let before = cpu.read_reg(dest);
    let (result, flags) = alu::add(before, imm, width);
    cpu.state.rflags.merge_status(flags);
    cpu.write_reg(dest, result);
    cpu.last_disasm = Some(format!("ADD {}, {}", reg_name(dest), format_imm(imm, width)));
    false
}

fn mov_rm_r_real_mode_only(cpu: &mut Cpu, prefixes: &mut Prefixes) -> bool {
    if !real_mode_only(cpu) {
        return unimplemented(cpu, prefixes);
    }
    let rm = cpu.fetch_modrm(prefixes, OperandKind::GprWidth);
    let width = rm.reg.width;
    let value = cpu.read_reg(rm.reg);
    if cpu.write_rm(&rm, prefixes, SegmentPick::Ds, width, value) {
        cpu.last_disasm = Some(format!("MOV {}, {}", format_rm(&rm, width), reg_name(rm.reg)));
    }
    false
}

fn mov_rm_sreg(cpu: &mut Cpu, prefixes: &mut Prefixes) -> bool {
    let rm = cpu.fetch_modrm(prefixes, OperandKind::Segment);
    let width = aero_cpu_decoder::operand_width(cpu.state.mode(), prefixes);
    let selector = match rm.reg_index {
        0 => cpu.state.segments.es.selector,
        1 => cpu.state.segments.cs.selector,
        2 => cpu.state.segments.ss.selector,
        3 => cpu.state.segments.ds.selector,
        4 => cpu.state.segments.fs.selector,
        5 => cpu.state.segments.gs.selector,
        _ => 0,
    };
    if cpu.write_rm(&rm, prefixes, SegmentPick::Ds, width, selector as u64) {
        cpu.last_disasm = Some(format!("MOV {}, Sreg{}", format_rm(&rm, width), rm.reg_index));
    }
    false
}

fn mov_bx_imm(cpu: &mut Cpu, prefixes: &mut Prefixes) -> bool {
    let width = aero_cpu_decoder::operand_width(cpu.state.mode(), prefixes);
    let imm = cpu.fetch_imm(width);
    let dest = reg_ref(gpr::BX, width);
    cpu.write_reg(dest, imm);
    cpu.last_disasm = Some(format!("MOV {}, {}", reg_name(dest), format_imm(imm, width)));
    false
}

/// `0xC1` sub-opcode table, keyed by ModR/M's `reg` field. Only `/4` (SHL)
/// is implemented; the rest halt uniformly like any other unimplemented
/// opcode rather than silently running with no effect.
fn shift_group1_imm8(cpu: &mut Cpu, prefixes: &mut Prefixes) -> bool {
    let rm = cpu.fetch_modrm(prefixes, OperandKind::GprWidth);
    let width = rm.reg.width;
    if rm.reg_index != 4 {
        return unimplemented(cpu, prefixes);
    }
    let count = cpu.fetch_u8();
    let before = match cpu.read_rm(&rm, prefixes, SegmentPick::Ds, width) {
        Some(v) => v,
        None => return false,
    };
    let (result, flags) = alu::shl(before, count, width, cpu.state.rflags);
    cpu.state.rflags = flags;
    if cpu.write_rm(&rm, prefixes, SegmentPick::Ds, width, result) {
        cpu.last_disasm = Some(format!("SHL {}, {}", format_rm(&rm, width), format_imm(count as u64, Width::W8)));
    }
    false
}

fn jmp_rel(cpu: &mut Cpu, prefixes: &mut Prefixes) -> bool {
    let width = aero_cpu_decoder::operand_width(cpu.state.mode(), prefixes);
    let disp: i64 = match width {
        Width::W16 => cpu.fetch_u16() as i16 as i64,
        _ => cpu.fetch_u32() as i32 as i64,
    };
    let target = (cpu.state.regs.ip as i64).wrapping_add(disp) as u64;
    cpu.state.regs.ip = target;
    cpu.last_disasm = Some(format!("JMP {:#x}", target));
    false
}

fn cli(cpu: &mut Cpu, _prefixes: &mut Prefixes) -> bool {
    let iopl_ok = cpu.state.rflags.iopl() as u64 >= (cpu.state.segments.cs.selector as u64 & 0x3);
    if real_mode_only(cpu) || iopl_ok {
        cpu.state.rflags.remove(Rflags::IF);
    } else if cpu.state.control.cr4.contains(crate::control::Cr4::VME) || cpu.state.control.cr4.contains(crate::control::Cr4::PVI)
    {
        cpu.state.rflags.remove(Rflags::VIF);
    } else {
        cpu.halt("GP(0): CLI with insufficient privilege");
        return false;
    }
    cpu.last_disasm = Some("CLI".to_string());
    false
}

fn hlt(cpu: &mut Cpu, _prefixes: &mut Prefixes) -> bool {
    cpu.last_disasm = Some("HLT".to_string());
    cpu.halt("HLT");
    false
}

fn rex_or_unimplemented(cpu: &mut Cpu, prefixes: &mut Prefixes) -> bool {
    if cpu.state.mode() == CpuMode::Long64 {
        prefixes.accumulate(cpu.last_opcode, true)
    } else {
        unimplemented(cpu, prefixes)
    }
}

fn op_size_prefix(_cpu: &mut Cpu, prefixes: &mut Prefixes) -> bool {
    prefixes.accumulate(0x66, false)
}

fn addr_size_prefix(_cpu: &mut Cpu, prefixes: &mut Prefixes) -> bool {
    prefixes.accumulate(0x67, false)
}

fn segment_override_prefix(cpu: &mut Cpu, prefixes: &mut Prefixes) -> bool {
    prefixes.accumulate(cpu.last_opcode, false)
}

pub fn primary_table() -> [Handler; 256] {
    let mut table: [Handler; 256] = [unimplemented; 256];
    table[0x00] = add_rm8_r8;
    table[0x01] = add_rm_r;
    table[0x02] = add_r8_rm8;
    table[0x03] = add_r_rm;
    table[0x04] = add_al_imm8;
    table[0x05] = add_eax_imm;
    table[0x0F] = two_byte_escape;
    table[0x26] = segment_override_prefix;
    table[0x29] = sub_rm_r;
    table[0x2E] = segment_override_prefix;
    table[0x31] = xor_rm_r;
    table[0x36] = segment_override_prefix;
    table[0x3E] = segment_override_prefix;
    let mut i = 0x40;
    while i <= 0x4F {
        table[i] = rex_or_unimplemented;
        i += 1;
    }
    table[0x64] = segment_override_prefix;
    table[0x65] = segment_override_prefix;
    table[0x66] = op_size_prefix;
    table[0x67] = addr_size_prefix;
    table[0x89] = mov_rm_r_real_mode_only;
    table[0x8C] = mov_rm_sreg;
    table[0xB0] = mov_al_imm8;
    table[0xBB] = mov_bx_imm;
    table[0xC1] = shift_group1_imm8;
    table[0xE9] = jmp_rel;
    table[0xF4] = hlt;
    table[0xFA] = cli;
    table
}

pub fn secondary_table() -> [Handler; 256] {
    [unimplemented_0f; 256]
}
