//! Arithmetic-logic primitives. Each operation exists as four genuinely
//! separate monomorphic functions (`u8`, `u16`, `u32`, `u64`) rather than one
//! routine that branches on a width tag at runtime: flag formulas such as
//! parity and the overflow top-bit test are width-dependent in a way that
//! does not generalize cleanly behind a single runtime `match`.

use crate::rflags::Rflags;

fn parity_even(low_byte: u8) -> bool {
    low_byte.count_ones() % 2 == 0
}

macro_rules! impl_add {
    ($name:ident, $ty:ty, $bits:expr) => {
        /// Returns `(a + b, flags)`. `flags` carries only the six status
        /// bits; callers merge them into a live `Rflags` via `set_status`.
        pub fn $name(a: $ty, b: $ty) -> ($ty, Rflags) {
            let res = a.wrapping_add(b);
            let top_bit: $ty = 1 << ($bits - 1);
            let cf = res < a;
            let af = ((a ^ b ^ res) & 0x10) != 0;
            let zf = res == 0;
            let sf = (res & top_bit) != 0;
            let of = ((a ^ b) & top_bit) == 0 && ((a ^ res) & top_bit) != 0;
            let mut flags = Rflags::empty();
            flags.set_status(cf, parity_even(res as u8), af, zf, sf, of);
            (res, flags)
        }
    };
}

macro_rules! impl_sub {
    ($name:ident, $ty:ty, $bits:expr) => {
        pub fn $name(a: $ty, b: $ty) -> ($ty, Rflags) {
            let res = a.wrapping_sub(b);
            let top_bit: $ty = 1 << ($bits - 1);
            let cf = a < b;
            let af = ((a ^ b ^ res) & 0x10) != 0;
            let zf = res == 0;
            let sf = (res & top_bit) != 0;
            let of = ((a ^ b) & top_bit) != 0 && ((a ^ res) & top_bit) != 0;
            let mut flags = Rflags::empty();
            flags.set_status(cf, parity_even(res as u8), af, zf, sf, of);
            (res, flags)
        }
    };
}

macro_rules! impl_xor {
    ($name:ident, $ty:ty, $bits:expr) => {
        pub fn $name(a: $ty, b: $ty) -> ($ty, Rflags) {
            let res = a ^ b;
            let top_bit: $ty = 1 << ($bits - 1);
            let zf = res == 0;
            let sf = (res & top_bit) != 0;
            let mut flags = Rflags::empty();
            flags.set_status(false, parity_even(res as u8), false, zf, sf, false);
            (res, flags)
        }
    };
}

macro_rules! impl_shl {
    ($name:ident, $ty:ty, $bits:expr, $mask:expr) => {
        /// `count` is the raw immediate/CL byte; only the low 5 (or 6 for
        /// 64-bit operands) bits are consulted. A zero count leaves the
        /// value and every flag unchanged, including the ones this
        /// operation would otherwise define.
        pub fn $name(a: $ty, count: u8, flags_in: Rflags) -> ($ty, Rflags) {
            let amount = (count & $mask) as u32;
            if amount == 0 {
                return (a, flags_in);
            }
            let res = if amount >= $bits {
                0
            } else {
                a.wrapping_shl(amount)
            };
            let top_bit: $ty = 1 << ($bits - 1);
            let cf = if amount <= $bits {
                ((a >> ($bits - amount.min($bits))) & 1) != 0
            } else {
                false
            };
            let zf = res == 0;
            let sf = (res & top_bit) != 0;
            let mut flags = flags_in;
            flags.set(Rflags::CF, cf);
            flags.set(Rflags::PF, parity_even(res as u8));
            flags.set(Rflags::ZF, zf);
            flags.set(Rflags::SF, sf);
            if amount == 1 {
                let of = cf != (sf);
                flags.set(Rflags::OF, of);
            }
            // AF is left undefined by SHL; we leave it as it was.
            (res, flags)
        }
    };
}

impl_add!(add_u8, u8, 8);
impl_add!(add_u16, u16, 16);
impl_add!(add_u32, u32, 32);
impl_add!(add_u64, u64, 64);

impl_sub!(sub_u8, u8, 8);
impl_sub!(sub_u16, u16, 16);
impl_sub!(sub_u32, u32, 32);
impl_sub!(sub_u64, u64, 64);

impl_xor!(xor_u8, u8, 8);
impl_xor!(xor_u16, u16, 16);
impl_xor!(xor_u32, u32, 32);
impl_xor!(xor_u64, u64, 64);

impl_shl!(shl_u8, u8, 8, 0x1F);
impl_shl!(shl_u16, u16, 16, 0x1F);
impl_shl!(shl_u32, u32, 32, 0x1F);
impl_shl!(shl_u64, u64, 64, 0x3F);

use aero_cpu_decoder::Width;

/// Width-dispatching wrappers for call sites that don't know the operand
/// width until decode time. Each arm still calls one of the four genuinely
/// separate monomorphic functions above; this `match` does not itself
/// contain any width-dependent arithmetic.
pub fn add(a: u64, b: u64, width: Width) -> (u64, Rflags) {
    match width {
        Width::W8 => {
            let (r, f) = add_u8(a as u8, b as u8);
            (r as u64, f)
        }
        Width::W16 => {
            let (r, f) = add_u16(a as u16, b as u16);
            (r as u64, f)
        }
        Width::W32 => {
            let (r, f) = add_u32(a as u32, b as u32);
            (r as u64, f)
        }
        Width::W64 => add_u64(a, b),
    }
}

pub fn sub(a: u64, b: u64, width: Width) -> (u64, Rflags) {
    match width {
        Width::W8 => {
            let (r, f) = sub_u8(a as u8, b as u8);
            (r as u64, f)
        }
        Width::W16 => {
            let (r, f) = sub_u16(a as u16, b as u16);
            (r as u64, f)
        }
        Width::W32 => {
            let (r, f) = sub_u32(a as u32, b as u32);
            (r as u64, f)
        }
        Width::W64 => sub_u64(a, b),
    }
}

pub fn xor(a: u64, b: u64, width: Width) -> (u64, Rflags) {
    match width {
        Width::W8 => {
            let (r, f) = xor_u8(a as u8, b as u8);
            (r as u64, f)
        }
        Width::W16 => {
            let (r, f) = xor_u16(a as u16, b as u16);
            (r as u64, f)
        }
        Width::W32 => {
            let (r, f) = xor_u32(a as u32, b as u32);
            (r as u64, f)
        }
        Width::W64 => xor_u64(a, b),
    }
}

pub fn shl(a: u64, count: u8, width: Width, flags_in: Rflags) -> (u64, Rflags) {
    match width {
        Width::W8 => {
            let (r, f) = shl_u8(a as u8, count, flags_in);
            (r as u64, f)
        }
        Width::W16 => {
            let (r, f) = shl_u16(a as u16, count, flags_in);
            (r as u64, f)
        }
        Width::W32 => {
            let (r, f) = shl_u32(a as u32, count, flags_in);
            (r as u64, f)
        }
        Width::W64 => shl_u64(a, count, flags_in),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_carry_out() {
        let (res, flags) = add_u8(0xFF, 0x01);
        assert_eq!(res, 0x00);
        assert!(flags.contains(Rflags::CF));
        assert!(flags.contains(Rflags::ZF));
        assert!(!flags.contains(Rflags::OF));
    }

    #[test]
    fn add_signed_overflow() {
        let (res, flags) = add_u8(0x7F, 0x01);
        assert_eq!(res, 0x80);
        assert!(flags.contains(Rflags::OF));
        assert!(flags.contains(Rflags::SF));
        assert!(!flags.contains(Rflags::CF));
    }

    #[test]
    fn xor_self_zeroes_and_sets_zf() {
        let (res, flags) = xor_u16(0x1234, 0x1234);
        assert_eq!(res, 0);
        assert!(flags.contains(Rflags::ZF));
        assert!(!flags.contains(Rflags::CF));
        assert!(!flags.contains(Rflags::OF));
        assert!(!flags.contains(Rflags::AF));
    }

    #[test]
    fn sub_borrow() {
        let (res, flags) = sub_u8(0x00, 0x01);
        assert_eq!(res, 0xFF);
        assert!(flags.contains(Rflags::CF));
        assert!(flags.contains(Rflags::SF));
    }

    #[test]
    fn shl_shifts_out_correct_carry_bit() {
        let (res, flags) = shl_u8(0b1000_0001, 1, Rflags::empty());
        assert_eq!(res, 0b0000_0010);
        assert!(flags.contains(Rflags::CF));
    }

    #[test]
    fn shl_zero_count_is_a_no_op() {
        let before = Rflags::CF | Rflags::ZF;
        let (res, flags) = shl_u16(0x1234, 0, before);
        assert_eq!(res, 0x1234);
        assert_eq!(flags, before);
    }
}
