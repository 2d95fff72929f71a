//! Minimal Intel-syntax text rendering of decoded operands, used for the
//! always-on per-instruction disassembly line (see the CLI crate) and for
//! `tracing` diagnostics. Not a general disassembler: it only needs to
//! describe the handlers this implementation actually executes.

use aero_cpu_decoder::{EffectiveAddress, ModRmDescriptor, RegRef, RmTarget, Width};

const NAMES_W8: [&str; 16] = [
    "AL", "CL", "DL", "BL", "SPL", "BPL", "SIL", "DIL", "R8B", "R9B", "R10B", "R11B", "R12B", "R13B", "R14B", "R15B",
];
const NAMES_W8_HIGH: [&str; 4] = ["AH", "CH", "DH", "BH"];
const NAMES_W16: [&str; 16] = [
    "AX", "CX", "DX", "BX", "SP", "BP", "SI", "DI", "R8W", "R9W", "R10W", "R11W", "R12W", "R13W", "R14W", "R15W",
];
const NAMES_W32: [&str; 16] = [
    "EAX", "ECX", "EDX", "EBX", "ESP", "EBP", "ESI", "EDI", "R8D", "R9D", "R10D", "R11D", "R12D", "R13D", "R14D",
    "R15D",
];
const NAMES_W64: [&str; 16] = [
    "RAX", "RCX", "RDX", "RBX", "RSP", "RBP", "RSI", "RDI", "R8", "R9", "R10", "R11", "R12", "R13", "R14", "R15",
];

pub fn reg_name(reg: RegRef) -> String {
    if reg.high_byte {
        return NAMES_W8_HIGH[reg.index as usize & 0x3].to_string();
    }
    let table = match reg.width {
        Width::W8 => &NAMES_W8,
        Width::W16 => &NAMES_W16,
        Width::W32 => &NAMES_W32,
        Width::W64 => &NAMES_W64,
    };
    table[reg.index as usize & 0xF].to_string()
}

pub fn width_ptr_keyword(width: Width) -> &'static str {
    match width {
        Width::W8 => "BYTE",
        Width::W16 => "WORD",
        Width::W32 => "DWORD",
        Width::W64 => "QWORD",
    }
}

fn format_effective_address(ea: &EffectiveAddress) -> String {
    if ea.rip_relative {
        return format!("[RIP+{:#x}]", ea.disp);
    }
    let mut parts = Vec::new();
    if let Some(base) = ea.base {
        parts.push(reg_name(base));
    }
    if let Some((index, scale)) = ea.index {
        parts.push(format!("{}*{}", reg_name(index), scale));
    }
    let mut s = parts.join("+");
    if ea.disp != 0 || s.is_empty() {
        if s.is_empty() {
            s = format!("{:#x}", ea.disp);
        } else if ea.disp > 0 {
            s.push_str(&format!("+{:#x}", ea.disp));
        } else {
            s.push_str(&format!("-{:#x}", -ea.disp));
        }
    }
    format!("[{s}]")
}

pub fn format_rm(rm: &ModRmDescriptor, width: Width) -> String {
    match rm.rm {
        RmTarget::Register(r) => reg_name(r),
        RmTarget::Memory(ea) => format!("{} PTR {}", width_ptr_keyword(width), format_effective_address(&ea)),
    }
}

pub fn format_imm(value: u64, width: Width) -> String {
    match width {
        Width::W8 => format!("{:#x}", value as u8),
        Width::W16 => format!("{:#x}", value as u16),
        Width::W32 => format!("{:#x}", value as u32),
        Width::W64 => format!("{value:#x}"),
    }
}
