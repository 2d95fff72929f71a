use std::io::Write;
use std::process::Command;

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_aero-machine")
}

/// Pads `bytes` to 16 bytes so that, once loaded with its last byte at the
/// top of a 4 GiB image, `bytes[0]` lands exactly on the reset vector
/// `0xFFFFFFF0` (16 bytes below the top of memory). The padding is HLT so a
/// short program that doesn't reach it stops the run on its own.
fn rom_at_reset_vector(bytes: &[u8]) -> Vec<u8> {
    let mut rom = bytes.to_vec();
    rom.resize(16, 0xF4);
    rom
}

fn write_rom(path: &std::path::Path, bytes: &[u8]) {
    std::fs::File::create(path).unwrap().write_all(&rom_at_reset_vector(bytes)).unwrap();
}

#[test]
fn halts_cleanly_on_hlt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rom.bin");
    write_rom(&path, &[0xF4]);

    let output = Command::new(bin()).arg(&path).output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("HLT"));
}

#[test]
fn prints_disassembly_for_add() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rom.bin");
    // ADD AL, 0x05 then HLT.
    write_rom(&path, &[0x04, 0x05, 0xF4]);

    let output = Command::new(bin()).arg(&path).output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ADD AL, 0x5"));
    assert!(stdout.contains("HLT"));
}

#[test]
fn missing_rom_exits_nonzero() {
    let output = Command::new(bin()).arg("/nonexistent/path/rom.bin").output().unwrap();
    assert!(!output.status.success());
}
