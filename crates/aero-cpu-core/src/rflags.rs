use bitflags::bitflags;

bitflags! {
    /// The architectural flag word. Bit 1 is reserved and fixed to 1; bit 3
    /// is reserved and fixed to 0. No handler may clear the former or set
    /// the latter.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Rflags: u64 {
        const CF = 1 << 0;
        const RESERVED_1 = 1 << 1;
        const PF = 1 << 2;
        const AF = 1 << 4;
        const ZF = 1 << 6;
        const SF = 1 << 7;
        const TF = 1 << 8;
        const IF = 1 << 9;
        const DF = 1 << 10;
        const OF = 1 << 11;
        const IOPL0 = 1 << 12;
        const IOPL1 = 1 << 13;
        const NT = 1 << 14;
        const RF = 1 << 16;
        const VM = 1 << 17;
        const AC = 1 << 18;
        const VIF = 1 << 19;
        const VIP = 1 << 20;
        const ID = 1 << 21;
    }
}

impl Rflags {
    pub const IOPL_MASK: u64 = Self::IOPL0.bits() | Self::IOPL1.bits();

    pub fn reset() -> Self {
        Rflags::RESERVED_1
    }

    pub fn iopl(&self) -> u8 {
        ((self.bits() & Self::IOPL_MASK) >> 12) as u8
    }

    pub fn set_status(&mut self, cf: bool, pf: bool, af: bool, zf: bool, sf: bool, of: bool) {
        self.set(Rflags::CF, cf);
        self.set(Rflags::PF, pf);
        self.set(Rflags::AF, af);
        self.set(Rflags::ZF, zf);
        self.set(Rflags::SF, sf);
        self.set(Rflags::OF, of);
        // Reserved bits are never touched by `set`, which only flips the
        // named flags; RESERVED_1 stays whatever it already was.
        self.insert(Rflags::RESERVED_1);
    }

    /// The status bits an ALU primitive defines: `CF,PF,AF,ZF,SF,OF`.
    const STATUS_MASK: u64 =
        Self::CF.bits() | Self::PF.bits() | Self::AF.bits() | Self::ZF.bits() | Self::SF.bits() | Self::OF.bits();

    /// Copies only the six status bits from `from` into `self`, leaving
    /// every other bit (IF, DF, IOPL, ...) untouched.
    pub fn merge_status(&mut self, from: Rflags) {
        let bits = (self.bits() & !Self::STATUS_MASK) | (from.bits() & Self::STATUS_MASK);
        *self = Rflags::from_bits_truncate(bits);
    }
}

impl Default for Rflags {
    fn default() -> Self {
        Self::reset()
    }
}
