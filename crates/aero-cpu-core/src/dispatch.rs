use std::sync::OnceLock;

use crate::handlers::{primary_table, secondary_table, Handler};

static PRIMARY: OnceLock<[Handler; 256]> = OnceLock::new();
static SECONDARY: OnceLock<[Handler; 256]> = OnceLock::new();

/// The primary 256-entry dispatch table, built once on first use.
pub fn primary() -> &'static [Handler; 256] {
    PRIMARY.get_or_init(primary_table)
}

/// The `0x0F`-extension 256-entry dispatch table.
pub fn secondary() -> &'static [Handler; 256] {
    SECONDARY.get_or_init(secondary_table)
}
