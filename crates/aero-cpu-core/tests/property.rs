use aero_cpu_core::alu;
use aero_cpu_core::rflags::Rflags;
use proptest::prelude::*;

proptest! {
    /// For all widths, ADD's CF bit equals `((a+b) mod 2^(w+1)) >> w`.
    #[test]
    fn add_carry_matches_wide_sum_u8(a: u8, b: u8) {
        let (_, flags) = alu::add_u8(a, b);
        let wide = a as u16 + b as u16;
        prop_assert_eq!(flags.contains(Rflags::CF), (wide >> 8) != 0);
    }

    #[test]
    fn add_carry_matches_wide_sum_u16(a: u16, b: u16) {
        let (_, flags) = alu::add_u16(a, b);
        let wide = a as u32 + b as u32;
        prop_assert_eq!(flags.contains(Rflags::CF), (wide >> 16) != 0);
    }

    #[test]
    fn add_carry_matches_wide_sum_u32(a: u32, b: u32) {
        let (_, flags) = alu::add_u32(a, b);
        let wide = a as u64 + b as u64;
        prop_assert_eq!(flags.contains(Rflags::CF), (wide >> 32) != 0);
    }

    /// ZF is set if and only if the result is zero, independent of width.
    #[test]
    fn add_zero_flag_matches_result_u32(a: u32, b: u32) {
        let (res, flags) = alu::add_u32(a, b);
        prop_assert_eq!(flags.contains(Rflags::ZF), res == 0);
    }

    #[test]
    fn sub_zero_flag_matches_result_u32(a: u32, b: u32) {
        let (res, flags) = alu::sub_u32(a, b);
        prop_assert_eq!(flags.contains(Rflags::ZF), res == 0);
    }

    /// SUB's CF is the borrow bit: set exactly when `a < b` unsigned.
    #[test]
    fn sub_borrow_matches_unsigned_compare_u32(a: u32, b: u32) {
        let (_, flags) = alu::sub_u32(a, b);
        prop_assert_eq!(flags.contains(Rflags::CF), a < b);
    }

    /// `a XOR a == 0` for every width, with ZF set and CF/OF/AF clear.
    #[test]
    fn xor_self_is_always_zero_u32(a: u32) {
        let (res, flags) = alu::xor_u32(a, a);
        prop_assert_eq!(res, 0);
        prop_assert!(flags.contains(Rflags::ZF));
        prop_assert!(!flags.contains(Rflags::CF));
        prop_assert!(!flags.contains(Rflags::OF));
        prop_assert!(!flags.contains(Rflags::AF));
    }

    /// PF mirrors the parity of the result's low byte regardless of op.
    #[test]
    fn add_parity_matches_low_byte_popcount(a: u32, b: u32) {
        let (res, flags) = alu::add_u32(a, b);
        let even = (res as u8).count_ones() % 2 == 0;
        prop_assert_eq!(flags.contains(Rflags::PF), even);
    }

    /// SHL by zero never changes the value or any flag.
    #[test]
    fn shl_zero_count_is_always_a_no_op(a: u32, seed_flags in 0u32..64) {
        let before = Rflags::from_bits_truncate(seed_flags);
        let (res, flags) = alu::shl_u32(a, 0, before);
        prop_assert_eq!(res, a);
        prop_assert_eq!(flags, before);
    }

    /// SHL by >= the operand width always yields zero.
    #[test]
    fn shl_by_width_or_more_zeroes_u32(a: u32) {
        let (res, _) = alu::shl_u32(a, 32, Rflags::empty());
        prop_assert_eq!(res, 0);
    }
}
