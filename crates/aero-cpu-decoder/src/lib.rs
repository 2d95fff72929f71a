//! Hand-written prefix, ModR/M, and SIB decoding for the 64-bit
//! x86-compatible instruction stream.
//!
//! This crate is deliberately decoupled from live register values and
//! memory: it only turns bytes into typed descriptors (`ModRmDescriptor`,
//! `SibDescriptor`, `EffectiveAddress`) via the [`InstructionStream`] cursor
//! trait. A CPU implementation resolves those descriptors against its own
//! register file and memory.

mod modrm;
mod prefix;
mod stream;
mod width;

pub use modrm::{
    decode_modrm, operand_width, EffectiveAddress, ModRmDescriptor, OperandKind, RegRef, RmTarget, SibDescriptor,
};
pub use prefix::{Prefixes, SegmentOverride};
pub use stream::{InstructionStream, SliceStream};
pub use width::{CpuMode, Width};
