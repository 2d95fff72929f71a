use aero_cpu_decoder::{EffectiveAddress, SegmentOverride};

use crate::segments::{Segment, SegmentFile};

/// Which segment governs a memory reference absent an override prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentPick {
    Ds,
    Ss,
    Es,
    Cs,
}

pub fn pick_segment<'a>(
    segments: &'a SegmentFile,
    default: SegmentPick,
    override_prefix: Option<SegmentOverride>,
) -> &'a Segment {
    let effective = match override_prefix {
        Some(SegmentOverride::Es) => SegmentPick::Es,
        Some(SegmentOverride::Cs) => SegmentPick::Cs,
        Some(SegmentOverride::Ss) => SegmentPick::Ss,
        Some(SegmentOverride::Ds) => SegmentPick::Ds,
        Some(SegmentOverride::Fs) => return &segments.fs,
        Some(SegmentOverride::Gs) => return &segments.gs,
        None => default,
    };
    match effective {
        SegmentPick::Ds => &segments.ds,
        SegmentPick::Ss => &segments.ss,
        SegmentPick::Es => &segments.es,
        SegmentPick::Cs => &segments.cs,
    }
}

/// Resolves a decoded effective address to a linear address, given the live
/// register values it references. RIP-relative addresses already carry
/// their IP-relative offset in `disp` (computed at decode time); every other
/// form sums base/index/disp here.
pub fn resolve_linear_address(
    ea: &EffectiveAddress,
    segment_base: u64,
    read_reg: impl Fn(aero_cpu_decoder::RegRef) -> u64,
) -> u64 {
    if ea.rip_relative {
        return segment_base.wrapping_add(ea.disp as u64);
    }
    let base_val = ea.base.map(&read_reg).unwrap_or(0);
    let index_val = ea
        .index
        .map(|(reg, scale)| read_reg(reg).wrapping_mul(scale as u64))
        .unwrap_or(0);
    segment_base
        .wrapping_add(base_val)
        .wrapping_add(index_val)
        .wrapping_add(ea.disp as u64)
}
