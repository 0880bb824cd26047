//! JSON-RPC tools against the fake console.

mod common;

use std::path::PathBuf;

use apple2_console::config::Machine;
use apple2_console::mcp::McpServer;
use serde_json::{Value, json};

use common::{FakeLauncher, machine_with};

fn server() -> (McpServer<FakeLauncher>, common::Fake) {
    let (apple2, fake) = machine_with(Machine::Enhanced);
    (McpServer::with_machine(apple2, PathBuf::from("/nonexistent/bobbin")), fake)
}

fn call(server: &mut McpServer<FakeLauncher>, method: &str, params: Value) -> Value {
    let request = json!({"jsonrpc": "2.0", "method": method, "params": params, "id": 7});
    let line = server.handle_line(&request.to_string()).expect("response");
    let response: Value = serde_json::from_str(&line).expect("json response");
    assert_eq!(response["id"], 7);
    response
}

fn result(server: &mut McpServer<FakeLauncher>, method: &str, params: Value) -> Value {
    let response = call(server, method, params);
    assert!(response.get("error").is_none(), "{method}: {response}");
    response["result"].clone()
}

#[test]
fn boot_peek_and_poke() {
    let (mut server, fake) = server();
    assert_eq!(result(&mut server, "boot", json!({}))["machine"], "enhanced");

    let poked = result(&mut server, "poke", json!({"address": "$0300", "hex": "A9 01 60"}));
    assert_eq!(poked["length"], 3);
    let peeked = result(&mut server, "peek", json!({"address": "0x0300", "count": 3}));
    assert_eq!(peeked["address"], "$0300");
    assert_eq!(peeked["hex"], "A9 01 60");
    assert_eq!(peeked["bytes"], json!([0xA9, 0x01, 0x60]));

    result(&mut server, "poke", json!({"address": 0x2000, "bank": "aux", "bytes": [1, 2]}));
    let aux = result(&mut server, "peek", json!({"address": 0x2000, "count": 2, "bank": "aux"}));
    assert_eq!(aux["hex"], "01 02");
    assert_eq!(fake.state().bank_byte(apple2_memory::Bank::Main, 0x2000), 0);
}

#[test]
fn screen_and_switches() {
    let (mut server, _fake) = server();
    result(&mut server, "boot", json!({}));
    let typed = result(&mut server, "type_line", json!({"text": "PRINT \"HELLO\""}));
    assert_eq!(typed["output"], json!(["HELLO"]));

    let screen = result(&mut server, "get_screen_text", json!({}));
    assert_eq!(screen["lines"][0], "APPLE //E");
    assert!(screen["text"].as_str().expect("text").contains("\nHELLO\n"));

    let switches = result(&mut server, "soft_switches", json!({}));
    assert_eq!(switches["text"], true);
    assert_eq!(switches["hires"], false);

    let frame = result(&mut server, "capture_frame", json!({"mode": "text40"}));
    assert_eq!(frame["mode"], "text40");
    assert_eq!(frame["width"], 40);
    assert!(frame["data"].is_string());
    assert_eq!(frame["lines"].as_array().map(Vec::len), Some(24));
}

#[test]
fn tokenize_and_inject() {
    let (mut server, _fake) = server();
    result(&mut server, "boot", json!({}));
    let tokenized = result(&mut server, "tokenize", json!({"source": "10 PRINT \"HI\""}));
    assert_eq!(tokenized["start"], "$0801");
    assert_eq!(tokenized["length"], 12);
    assert_eq!(tokenized["hex"], "0B 08 0A 00 BA 22 48 49 22 00 00 00");
    assert!(tokenized["listing"].as_str().expect("listing").contains("PRINT"));

    let compared = result(
        &mut server,
        "compare_tokenization",
        json!({"source": "10 PRINT \"HI\"", "candidate": "0B 08 0A 00 BA 22 48 49 22 00 00 00"}),
    );
    assert_eq!(compared["match"], true);

    result(&mut server, "type_line", json!({"text": "NEW"}));
    let injected = result(
        &mut server,
        "inject_program",
        json!({"hex": "0B080A00BA2248492200 0000", "auto_run": true}),
    );
    assert_eq!(injected["load_address"], 0x0801);
    assert_eq!(injected["run_output"], json!(["HI"]));

    let pointers = result(&mut server, "basic_pointers", json!({}));
    assert_eq!(pointers["vartab"], 0x080D);
}

#[test]
fn inject_program_relinks_to_the_load_address() {
    let (mut server, fake) = server();
    result(&mut server, "boot", json!({}));
    let injected = result(
        &mut server,
        "inject_program",
        json!({"hex": "0B080A00BA2248492200 0000", "load_address": "$4001", "auto_run": true}),
    );
    assert_eq!(injected["load_address"], 0x4001);
    assert_eq!(injected["pointers"], json!([0x4001, 0x400D, 0x400D, 0x400D, 0x400D]));
    assert_eq!(injected["run_output"], json!(["HI"]));
    {
        let mut state = fake.state();
        assert_eq!(state.bank_byte(apple2_memory::Bank::Main, 0x4001), 0x0B);
        assert_eq!(state.bank_byte(apple2_memory::Bank::Main, 0x4002), 0x40);
    }

    // An image linked for $4001 loads where it was linked.
    let linked_high = result(
        &mut server,
        "inject_program",
        json!({"hex": "0B400A00BA2248492200 0000", "start": "$4001"}),
    );
    assert_eq!(linked_high["load_address"], 0x4001);
    let wrong_start = call(
        &mut server,
        "inject_program",
        json!({"hex": "0B400A00BA2248492200 0000"}),
    );
    assert_eq!(wrong_start["error"]["code"], -32000);
}

#[test]
fn keys_reach_the_keyboard() {
    let (mut server, fake) = server();
    assert_eq!(call(&mut server, "send_key", json!({"key": "RETURN"}))["error"]["code"], -32000);
    result(&mut server, "boot", json!({}));

    let captured = result(
        &mut server,
        "send_keys_and_capture",
        json!({"keys": "k", "delay_ms": 10, "capture_mode": "text"}),
    );
    assert_eq!(captured["keys"], "K");
    assert_eq!(captured["mode"], "text40");
    assert_eq!(captured["screen"].as_array().map(Vec::len), Some(24));
    assert!(fake.state().keys.contains(&b'K'));

    // The pending K becomes the line RETURN enters.
    let entered = result(&mut server, "send_key", json!({"key": "RETURN", "delay_ms": 10}));
    assert_eq!(entered["key"], "RETURN");
    assert!(entered["output"].as_array().expect("output").contains(&json!("?SYNTAX ERROR")));
    assert_eq!(fake.state().typed.last().map(String::as_str), Some("K"));

    result(&mut server, "send_key", json!({"key": "ESCAPE", "delay_ms": 10}));
    assert_eq!(fake.state().keys.last(), Some(&0x1B));
    result(&mut server, "send_key", json!({"key": "ctrl-c", "delay_ms": 10}));
    assert_eq!(fake.state().keys.last(), Some(&0x03));
    result(&mut server, "send_key", json!({"key": "CTRL-RESET"}));
    assert_eq!(fake.state().commands.last().map(String::as_str), Some("r"));
    assert_eq!(result(&mut server, "type_line", json!({"text": "PRINT \"OK\""}))["output"], json!(["OK"]));

    assert_eq!(call(&mut server, "send_key", json!({"key": "TAB"}))["error"]["code"], -32602);
    assert_eq!(call(&mut server, "send_key", json!({}))["error"]["code"], -32602);
    let too_long = call(&mut server, "send_keys_and_capture", json!({"keys": "K", "delay_ms": 6000}));
    assert_eq!(too_long["error"]["code"], -32602);
}

#[test]
fn ascii_screens_after_clearing() {
    let (mut server, _fake) = server();
    result(&mut server, "boot", json!({}));

    result(&mut server, "clear_gr", json!({"color": 9}));
    let gr = result(&mut server, "read_gr_ascii", json!({}));
    assert_eq!((gr["width"].clone(), gr["height"].clone()), (json!(40), json!(48)));
    assert_eq!(gr["lines"][0], "9".repeat(40));
    assert_eq!(gr["lines"][39], "9".repeat(40));
    // Text row 20 is still spaces: low nibble 0, high nibble A.
    assert_eq!(gr["lines"][40], "0".repeat(40));
    assert_eq!(gr["lines"][41], "A".repeat(40));

    result(&mut server, "clear_hgr", json!({"page": 1}));
    let hgr = result(&mut server, "read_hgr_ascii", json!({"page": 1}));
    assert_eq!(hgr["width"], 280);
    assert_eq!(hgr["lines"][0], ".".repeat(280));

    let dgr = result(&mut server, "read_dgr_ascii", json!({}));
    assert_eq!(dgr["width"], 80);
    let dhgr = result(&mut server, "read_dhgr_ascii", json!({"page": 2}));
    assert_eq!((dhgr["width"].clone(), dhgr["page"].clone()), (json!(560), json!("two")));

    assert_eq!(call(&mut server, "clear_gr", json!({"color": 16}))["error"]["code"], -32602);
    assert_eq!(call(&mut server, "clear_hgr", json!({"page": 3}))["error"]["code"], -32602);
    assert_eq!(call(&mut server, "read_gr_ascii", json!({"page": 0}))["error"]["code"], -32602);
}

#[test]
fn run_and_type_with_capture() {
    let (mut server, fake) = server();
    result(&mut server, "boot", json!({}));
    result(&mut server, "type_line", json!({"text": "10 PRINT \"HI\""}));

    let ran = result(&mut server, "run_and_capture", json!({"capture_mode": "text", "timeout": 1}));
    assert_eq!(ran["command"], "RUN");
    assert_eq!(ran["output"], json!(["HI"]));
    assert!(ran["screen"].as_array().expect("screen").contains(&json!("HI")));
    let hgr = result(&mut server, "run_and_capture", json!({"capture_mode": "hgr"}));
    assert_eq!(hgr["mode"], "hires");
    assert_eq!(hgr["screen"][0].as_str().map(str::len), Some(280));
    assert_eq!(call(&mut server, "run_and_capture", json!({"capture_mode": "vga"}))["error"]["code"], -32602);
    assert_eq!(call(&mut server, "run_and_capture", json!({"timeout": -1}))["error"]["code"], -32602);

    let typed = result(&mut server, "type_and_capture", json!({"basic_line": "10 PRINT \"HI\""}));
    assert_eq!(typed["typed"], "10 PRINT \"HI\"");
    assert_eq!(typed["length"], 12);
    assert_eq!(typed["hex"], "0B 08 0A 00 BA 22 48 49 22 00 00 00");
    assert!(typed["annotation"].as_str().is_some_and(|a| a.contains("BA=PRINT")));
    assert_eq!(fake.state().typed.last().map(String::as_str), Some("10 PRINT \"HI\""));
    assert_eq!(call(&mut server, "type_and_capture", json!({}))["error"]["code"], -32602);
}

#[test]
fn errors_use_json_rpc_codes() {
    let (mut server, _fake) = server();
    assert_eq!(call(&mut server, "warp_speed", json!({}))["error"]["code"], -32601);
    assert_eq!(call(&mut server, "peek", json!({}))["error"]["code"], -32602);
    assert_eq!(call(&mut server, "peek", json!({"address": "$0300"}))["error"]["code"], -32000);
    assert_eq!(call(&mut server, "boot", json!({"machine": "vic20"}))["error"]["code"], -32602);

    let line = server.handle_line("{not json").expect("response");
    let response: Value = serde_json::from_str(&line).expect("json response");
    assert_eq!(response["error"]["code"], -32700);
    assert!(server.handle_line("   ").is_none());
}

#[test]
fn registers_and_cursor() {
    let (mut server, _fake) = server();
    result(&mut server, "boot", json!({}));
    let registers = result(&mut server, "registers", json!({}));
    assert_eq!(registers["pc"], 0xFD1B);
    let cursor = result(&mut server, "cursor", json!({}));
    assert_eq!(cursor, json!({"column": 1, "row": 2}));
    result(&mut server, "shutdown", json!({}));
    assert_eq!(call(&mut server, "cursor", json!({}))["error"]["code"], -32000);
}
