//! Sessions against a real Bobbin binary.
//!
//! Run with `cargo test -p apple2-console -- --ignored` with `bobbin` on
//! the search path `find_emulator` uses.

use std::path::Path;

use apple2_console::{Apple2, Apple2Config, InjectOptions, ProcessLauncher, SessionState};

fn installed(emulator: &Path) -> bool {
    emulator.is_file()
        || std::env::var_os("PATH")
            .is_some_and(|paths| std::env::split_paths(&paths).any(|dir| dir.join(emulator).is_file()))
}

fn live_machine() -> Option<Apple2<ProcessLauncher>> {
    let config = Apple2Config::default();
    if !installed(&config.emulator) {
        eprintln!("Skipping: bobbin not found");
        return None;
    }
    Some(Apple2::open(config).expect("valid config"))
}

#[test]
#[ignore] // Requires the bobbin emulator
fn boots_to_the_prompt_and_types() {
    let Some(mut apple2) = live_machine() else {
        return;
    };
    apple2.boot().expect("boot");
    assert_eq!(apple2.state(), SessionState::AtCommandPrompt);
    assert_eq!(apple2.type_line("PRINT 2+2").expect("typed"), vec![" 4".to_string()]);
    let lines = apple2.get_screen_text().expect("screen");
    assert!(lines.iter().any(|l| l.trim() == "4"), "{lines:?}");
    apple2.shutdown();
}

#[test]
#[ignore] // Requires the bobbin emulator
fn tokenize_then_inject() {
    let Some(mut apple2) = live_machine() else {
        return;
    };
    apple2.boot().expect("boot");
    let tokenized = apple2.tokenize("10 PRINT \"HI\"").expect("tokenized");
    assert_eq!(tokenized.hex(), "0B 08 0A 00 BA 22 48 49 22 00 00 00");

    apple2.type_line("NEW").expect("new");
    let options = InjectOptions {
        auto_run: true,
        ..InjectOptions::default()
    };
    let report = apple2.inject(&tokenized.image, &options).expect("injected");
    assert_eq!(report.run_output, Some(vec!["HI".to_string()]));
    apple2.shutdown();
}

#[test]
#[ignore] // Requires the bobbin emulator
fn aux_memory_round_trip() {
    let Some(mut apple2) = live_machine() else {
        return;
    };
    apple2.boot().expect("boot");
    let before = apple2.soft_switches().expect("switches");
    apple2
        .write_bank(apple2_memory::Bank::Aux, 0x6000, &[0xDE, 0xAD])
        .expect("aux write");
    assert_eq!(
        apple2.read_bank(apple2_memory::Bank::Aux, 0x6000, 2).expect("aux read"),
        vec![0xDE, 0xAD]
    );
    assert_eq!(apple2.soft_switches().expect("switches"), before);
    apple2.shutdown();
}
