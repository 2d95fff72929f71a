use aero_mem::Memory;
use proptest::prelude::*;

const CAP: usize = 64 * 1024;

proptest! {
    #[test]
    fn byte_round_trips_for_any_address(addr in 0u64..(CAP as u64 * 4), value in any::<u8>()) {
        let mut mem = Memory::new(CAP);
        mem.write(addr, value);
        prop_assert_eq!(mem.read(addr), value);
    }

    #[test]
    fn addresses_a_capacity_apart_alias(addr in 0u64..(CAP as u64), value in any::<u8>()) {
        let mut mem = Memory::new(CAP);
        mem.write(addr, value);
        prop_assert_eq!(mem.read(addr + CAP as u64), value);
        prop_assert_eq!(mem.read(addr.wrapping_add((CAP as u64) * 3)), value);
    }

    #[test]
    fn u32_round_trips(addr in 0u64..(CAP as u64 - 4), value in any::<u32>()) {
        let mut mem = Memory::new(CAP);
        mem.write_u32(addr, value);
        prop_assert_eq!(mem.read_u32(addr), value);
    }
}
