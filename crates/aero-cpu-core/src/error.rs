use thiserror::Error;

/// Errors surfaced at the boundary of `aero-cpu-core`, outside the
/// instruction-level fault/halt machinery described in the step loop.
///
/// Architectural faults (GP, PF, ...) and unimplemented opcodes are *not*
/// represented here: they are observed through [`crate::cpu::RunState`] and a
/// diagnostic log line, matching a physical processor's own in-band fault
/// delivery rather than a host-language exception.
#[derive(Debug, Error)]
pub enum CpuError {
    #[error("memory capacity {0} is not a supported configuration")]
    UnsupportedMemoryCapacity(usize),
}
