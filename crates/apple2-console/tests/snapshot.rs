//! Snapshots against the fake console.

mod common;

use std::path::PathBuf;

use apple2_console::config::Machine;
use apple2_console::{Apple2, Error, SessionState};
use apple2_memory::{Bank, SoftSwitches};
use common::{Fake, FakeLauncher, config, machine_from, scratch_dir};

/// A booted machine saving into its own directory, with large write
/// chunks so whole-bank restores stay quick.
fn booted_in(name: &str, model: Machine) -> (Apple2<FakeLauncher>, Fake, PathBuf) {
    let dir = scratch_dir(name);
    let mut config = config(&dir);
    config.machine = model;
    config.session.write_chunk = 0x100;
    let (mut apple2, fake) = machine_from(&config);
    apple2.boot().expect("fake boots");
    (apple2, fake, dir)
}

#[test]
fn save_and_restore_both_banks() {
    let (mut apple2, fake, dir) = booted_in("snap-banks", Machine::Enhanced);
    apple2.poke(0x0300, &[0xAB]).expect("main");
    apple2.write_bank(Bank::Aux, 0x2000, &[0xCD]).expect("aux");

    let path = apple2.save_snapshot("demo").expect("saved");
    assert_eq!(path, dir.join("demo.json"));
    let json: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).expect("file")).expect("json");
    assert_eq!(json["name"], "demo");
    assert!(json["main"].is_string());
    assert!(json["aux"].is_string());

    apple2.poke(0x0300, &[0x00]).expect("clobber main");
    apple2.write_bank(Bank::Aux, 0x2000, &[0x00]).expect("clobber aux");

    let snapshot = apple2.restore_snapshot("demo").expect("restored");
    assert_eq!(snapshot.main[0x0300], 0xAB);
    {
        let mut state = fake.state();
        assert_eq!(state.bank_byte(Bank::Main, 0x0300), 0xAB);
        assert_eq!(state.bank_byte(Bank::Aux, 0x2000), 0xCD);
    }
    assert_eq!(apple2.state(), SessionState::AtCommandPrompt);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn switches_come_back() {
    let (mut apple2, fake, dir) = booted_in("snap-switches", Machine::Enhanced);
    let hires = SoftSwitches {
        text: false,
        hires: true,
        ..apple2.soft_switches().expect("switches")
    };
    apple2.apply_switches(&hires).expect("hi-res");
    apple2.save_snapshot("graphics").expect("saved");

    let text = SoftSwitches {
        text: true,
        hires: false,
        ..hires
    };
    apple2.apply_switches(&text).expect("text");
    assert!(fake.state().switches.text);

    let snapshot = apple2.restore_snapshot("graphics").expect("restored");
    assert!(snapshot.switches.hires && !snapshot.switches.text);
    let live = fake.state().switches;
    assert!(live.hires);
    assert!(!live.text);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn restore_reboots_a_crashed_session() {
    let (mut apple2, fake, dir) = booted_in("snap-crash", Machine::Enhanced);
    apple2.poke(0x6000, &[0x12, 0x34]).expect("poke");
    apple2.save_snapshot("before").expect("saved");

    fake.state().hang = true;
    assert!(apple2.type_line("PRINT 1").is_err());
    assert_eq!(apple2.state(), SessionState::Crashed);
    fake.state().hang = false;

    apple2.restore_snapshot("before").expect("restored");
    assert_eq!(fake.state().launches, 2);
    assert_eq!(apple2.peek(0x6000, 2).expect("peek"), vec![0x12, 0x34]);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn machines_without_aux_save_main_only() {
    let (mut apple2, _fake, dir) = booted_in("snap-plus", Machine::Plus);
    let snapshot = apple2.take_snapshot("plus").expect("taken");
    assert!(snapshot.aux.is_none());
    assert_eq!(snapshot.main.len(), 0xC000);
    assert_eq!(snapshot.machine, Machine::Plus.to_string());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn bad_names_and_missing_files() {
    let (mut apple2, _fake, dir) = booted_in("snap-names", Machine::Enhanced);
    for name in ["../escape", "", "a/b"] {
        let err = apple2.save_snapshot(name).expect_err("invalid name");
        assert!(matches!(err, Error::Snapshot(_)), "{name}: {err}");
    }
    assert!(!dir.exists());

    let err = apple2.restore_snapshot("missing").expect_err("no such file");
    assert!(matches!(err, Error::Io(_)), "{err}");
    assert_eq!(apple2.state(), SessionState::AtCommandPrompt);
}
