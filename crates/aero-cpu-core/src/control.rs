use bitflags::bitflags;

bitflags! {
    /// CR0 control bits actually consulted by this implementation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Cr0: u64 {
        /// Protection enable: selects real vs. protected addressing.
        const PE = 1 << 0;
        /// Monitor coprocessor.
        const MP = 1 << 1;
        /// Emulation: no x87/SSE unit present, #NM on every such access.
        const EM = 1 << 2;
        /// Task switched: also triggers #NM until cleared.
        const TS = 1 << 3;
        /// Extension type, hardwired to 1 on modern parts.
        const ET = 1 << 4;
        /// Numeric error.
        const NE = 1 << 5;
        /// Write protect.
        const WP = 1 << 16;
        /// Alignment mask: gates #AC.
        const AM = 1 << 18;
        /// Not write-through.
        const NW = 1 << 29;
        /// Cache disable.
        const CD = 1 << 30;
        /// Paging enable.
        const PG = 1 << 31;
    }
}

impl Default for Cr0 {
    fn default() -> Self {
        Cr0::ET | Cr0::MP | Cr0::NE
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Cr4: u64 {
        const VME = 1 << 0;
        const PVI = 1 << 1;
        const PAE = 1 << 5;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Efer: u64 {
        /// Long-mode enable (set by software before entering long mode).
        const LME = 1 << 8;
        /// Long-mode active (set by hardware once paging turns on with LME).
        const LMA = 1 << 10;
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ControlRegisters {
    pub cr0: Cr0,
    pub cr2: u64,
    pub cr3: u64,
    pub cr4: Cr4,
    pub efer: Efer,
}
