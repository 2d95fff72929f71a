use crate::prefix::Prefixes;
use crate::stream::InstructionStream;
use crate::width::{CpuMode, Width};

/// The nominal operand kind an opcode asks the decoder to resolve. This is
/// the first link in the width-priority chain: `Byte` pins the width to 8
/// bits regardless of prefixes; `GprWidth` lets REX.W / the `0x66` prefix /
/// the mode default decide; the others carry their own fixed width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    Byte,
    GprWidth,
    Segment,
}

/// A reference to one lane of the register file. `high_byte` distinguishes
/// the legacy AH/CH/DH/BH encoding (only reachable without a REX prefix)
/// from the low-byte AL/CL/DL/BL/SPL/... encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegRef {
    pub index: u8,
    pub width: Width,
    pub high_byte: bool,
}

/// A resolved (but not yet loaded) memory operand: `base + index*scale +
/// disp`, truncated to the address width in force. When `rip_relative` is
/// set, `disp` already holds the fully resolved absolute address (computed
/// at decode time, since only the decoder knows the instruction-pointer
/// value immediately after the displacement is consumed) and `base`/`index`
/// are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EffectiveAddress {
    pub base: Option<RegRef>,
    pub index: Option<(RegRef, u8)>,
    pub disp: i64,
    pub rip_relative: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RmTarget {
    Register(RegRef),
    Memory(EffectiveAddress),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SibDescriptor {
    pub scale: u8,
    pub index: Option<u8>,
    pub base: Option<u8>,
}

#[derive(Debug, Clone, Copy)]
pub struct ModRmDescriptor {
    pub raw: u8,
    pub md: u8,
    pub reg_index: u8,
    pub rm_index: u8,
    pub reg: RegRef,
    pub rm: RmTarget,
    pub sib: Option<SibDescriptor>,
}

/// The width-priority chain applied outside of ModR/M decoding too: opcodes
/// like `ADD eAX, imm32` or `JMP rel32` need the same nominal-kind → REX.W →
/// `0x66` → mode-default resolution without a ModR/M byte to decode.
pub fn operand_width(mode: CpuMode, prefixes: &Prefixes) -> Width {
    resolve_width(mode, prefixes, OperandKind::GprWidth)
}

fn resolve_width(mode: CpuMode, prefixes: &Prefixes, kind: OperandKind) -> Width {
    match kind {
        OperandKind::Byte => Width::W8,
        OperandKind::Segment => Width::W16,
        OperandKind::GprWidth => {
            if mode == CpuMode::Long64 && prefixes.rex_w() {
                return Width::W64;
            }
            // Every mode on this machine, including real mode, defaults to a
            // 32-bit operand width; `0x66` always toggles it down to 16.
            if prefixes.op_size_override {
                Width::W16
            } else {
                Width::W32
            }
        }
    }
}

fn resolve_addr_width(mode: CpuMode, prefixes: &Prefixes) -> Width {
    let default = match mode {
        CpuMode::Real16 => Width::W16,
        CpuMode::Protected32 => Width::W32,
        CpuMode::Long64 => Width::W64,
    };
    if !prefixes.addr_size_override {
        return default;
    }
    match default {
        Width::W16 => Width::W32,
        Width::W32 => Width::W16,
        Width::W64 => Width::W32,
        other => other,
    }
}

fn make_reg_ref(raw3: u8, rex_ext: bool, has_rex: bool, width: Width) -> RegRef {
    if width == Width::W8 && !has_rex && (4..=7).contains(&raw3) {
        RegRef {
            index: raw3 - 4,
            width,
            high_byte: true,
        }
    } else {
        let idx = raw3 | if rex_ext { 8 } else { 0 };
        RegRef {
            index: idx,
            width,
            high_byte: false,
        }
    }
}

/// The fixed real-mode 16-bit addressing table (Intel Vol. 2, Table 2-1),
/// indexed by the ModR/M `rm` field: base register number, optional index
/// register number.
const REAL_MODE_TABLE: [(u8, Option<u8>); 8] = [
    (3, Some(6)), // BX + SI
    (3, Some(7)), // BX + DI
    (5, Some(6)), // BP + SI
    (5, Some(7)), // BP + DI
    (6, None),    // SI
    (7, None),    // DI
    (5, None),    // BP (mod!=0) / disp16 (mod==0)
    (3, None),    // BX
];

fn decode_rm_16<S: InstructionStream>(stream: &mut S, md: u8, rm: u8) -> RmTarget {
    if md == 0 && rm == 6 {
        let disp = stream.fetch_u16() as i64;
        return RmTarget::Memory(EffectiveAddress {
            base: None,
            index: None,
            disp,
            rip_relative: false,
        });
    }
    let (base_idx, index_idx) = REAL_MODE_TABLE[rm as usize];
    let disp = match md {
        0 => 0,
        1 => stream.fetch_i8() as i64,
        2 => stream.fetch_u16() as i16 as i64,
        _ => unreachable!("mod==3 handled by caller"),
    };
    RmTarget::Memory(EffectiveAddress {
        base: Some(RegRef {
            index: base_idx,
            width: Width::W16,
            high_byte: false,
        }),
        index: index_idx.map(|i| {
            (
                RegRef {
                    index: i,
                    width: Width::W16,
                    high_byte: false,
                },
                1,
            )
        }),
        disp,
        rip_relative: false,
    })
}

fn decode_sib<S: InstructionStream>(
    stream: &mut S,
    md: u8,
    prefixes: &Prefixes,
    addr_width: Width,
) -> (SibDescriptor, Option<RegRef>, Option<(RegRef, u8)>, bool) {
    let byte = stream.fetch_u8();
    let ss = byte >> 6;
    let index_bits = (byte >> 3) & 0x7;
    let base_bits = byte & 0x7;
    let scale = 1u8 << ss;

    let index = if index_bits == 4 && !prefixes.rex_x() {
        None
    } else {
        Some(index_bits | if prefixes.rex_x() { 8 } else { 0 })
    };
    let no_base_disp32 = base_bits == 5 && md == 0;
    let base = if no_base_disp32 {
        None
    } else {
        Some(base_bits | if prefixes.rex_b() { 8 } else { 0 })
    };

    let index_ref = index.map(|i| {
        (
            RegRef {
                index: i,
                width: addr_width,
                high_byte: false,
            },
            scale,
        )
    });
    let base_ref = base.map(|b| RegRef {
        index: b,
        width: addr_width,
        high_byte: false,
    });

    (
        SibDescriptor {
            scale,
            index,
            base,
        },
        base_ref,
        index_ref,
        no_base_disp32,
    )
}

fn decode_rm_32_64<S: InstructionStream>(
    stream: &mut S,
    mode: CpuMode,
    prefixes: &Prefixes,
    md: u8,
    rm: u8,
) -> (RmTarget, Option<SibDescriptor>) {
    let addr_width = resolve_addr_width(mode, prefixes);

    if rm == 4 {
        let (sib, base_ref, index_ref, no_base_disp32) = decode_sib(stream, md, prefixes, addr_width);
        let disp = if no_base_disp32 {
            stream.fetch_i32() as i64
        } else {
            match md {
                0 => 0,
                1 => stream.fetch_i8() as i64,
                2 => stream.fetch_i32() as i64,
                _ => unreachable!("mod==3 handled by caller"),
            }
        };
        return (
            RmTarget::Memory(EffectiveAddress {
                base: base_ref,
                index: index_ref,
                disp,
                rip_relative: false,
            }),
            Some(sib),
        );
    }

    if rm == 5 && md == 0 {
        let disp = stream.fetch_i32() as i64;
        let resolved = (stream.ip() as i64).wrapping_add(disp);
        return (
            RmTarget::Memory(EffectiveAddress {
                base: None,
                index: None,
                disp: resolved,
                rip_relative: true,
            }),
            None,
        );
    }

    let rex_b = prefixes.rex_b();
    let base_idx = rm | if rex_b { 8 } else { 0 };
    let disp = match md {
        0 => 0,
        1 => stream.fetch_i8() as i64,
        2 => stream.fetch_i32() as i64,
        _ => unreachable!("mod==3 handled by caller"),
    };
    (
        RmTarget::Memory(EffectiveAddress {
            base: Some(RegRef {
                index: base_idx,
                width: addr_width,
                high_byte: false,
            }),
            index: None,
            disp,
            rip_relative: false,
        }),
        None,
    )
}

/// Decodes one ModR/M (and, if present, SIB and displacement) starting at
/// the stream's current position. `kind` is the opcode's nominal operand
/// kind, the first step of the width-priority chain described in the module
/// addressing design.
pub fn decode_modrm<S: InstructionStream>(
    stream: &mut S,
    mode: CpuMode,
    prefixes: &Prefixes,
    kind: OperandKind,
) -> ModRmDescriptor {
    let raw = stream.fetch_u8();
    let md = raw >> 6;
    let reg_bits = (raw >> 3) & 0x7;
    let rm_bits = raw & 0x7;

    let reg_width = resolve_width(mode, prefixes, kind);
    let reg = make_reg_ref(reg_bits, prefixes.rex_r(), prefixes.has_rex(), reg_width);

    if md == 3 {
        let rm_reg = make_reg_ref(rm_bits, prefixes.rex_b(), prefixes.has_rex(), reg_width);
        return ModRmDescriptor {
            raw,
            md,
            reg_index: reg_bits,
            rm_index: rm_bits,
            reg,
            rm: RmTarget::Register(rm_reg),
            sib: None,
        };
    }

    let (rm, sib) = if mode == CpuMode::Real16 {
        (decode_rm_16(stream, md, rm_bits), None)
    } else {
        decode_rm_32_64(stream, mode, prefixes, md, rm_bits)
    };

    ModRmDescriptor {
        raw,
        md,
        reg_index: reg_bits,
        rm_index: rm_bits,
        reg,
        rm,
        sib,
    }
}
