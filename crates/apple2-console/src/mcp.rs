//! MCP (Model Context Protocol) server for the Apple II console bridge.
//!
//! Exposes the machine as a JSON-RPC 2.0 server over stdin/stdout. Tools
//! let AI agents and scripts boot the emulator, read and write memory,
//! capture the screen, and tokenize and inject Applesoft programs.

#![allow(clippy::cast_possible_truncation)]

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use apple2_memory::{Bank, Page};
use format_applesoft::{ProgramImage, annotate, list};

use crate::config::{Apple2Config, Machine};
use crate::console::{Launcher, ProcessLauncher};
use crate::display::DisplayMode;
use crate::error::Result;
use crate::inject::InjectOptions;
use crate::keyboard::{DEFAULT_SETTLE, Key};
use crate::machine::Apple2;
use crate::shared::Apple2Handle;
use crate::tokenize::TokenizeMode;

// ---------------------------------------------------------------------------
// JSON-RPC types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RpcRequest {
    jsonrpc: String,
    method: String,
    #[serde(default)]
    params: JsonValue,
    id: JsonValue,
}

#[derive(Serialize)]
struct RpcResponse {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
    id: JsonValue,
}

#[derive(Serialize)]
struct RpcError {
    code: i32,
    message: String,
}

impl RpcResponse {
    fn success(id: JsonValue, result: JsonValue) -> Self {
        Self {
            jsonrpc: "2.0",
            result: Some(result),
            error: None,
            id,
        }
    }

    fn error(id: JsonValue, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0",
            result: None,
            error: Some(RpcError { code, message }),
            id,
        }
    }

    /// `-32000` for a failed operation, otherwise the serialized value.
    fn from_result<T: Serialize>(id: JsonValue, result: Result<T>) -> Self {
        match result {
            Ok(value) => match serde_json::to_value(value) {
                Ok(json) => Self::success(id, json),
                Err(e) => Self::error(id, -32603, format!("Internal error: {e}")),
            },
            Err(e) => Self::error(id, -32000, e.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// MCP Server
// ---------------------------------------------------------------------------

/// MCP server wrapping one Apple II session.
pub struct McpServer<L: Launcher> {
    handle: Apple2Handle<L>,
    /// Emulator binary for `--tokenize` runs.
    emulator: PathBuf,
}

impl McpServer<ProcessLauncher> {
    pub fn new(config: Apple2Config) -> Result<Self> {
        let emulator = config.emulator.clone();
        Ok(Self::with_machine(Apple2::open(config)?, emulator))
    }
}

impl<L: Launcher> McpServer<L> {
    #[must_use]
    pub fn with_machine(machine: Apple2<L>, emulator: PathBuf) -> Self {
        Self {
            handle: Apple2Handle::new(machine),
            emulator,
        }
    }

    #[must_use]
    pub fn handle(&self) -> &Apple2Handle<L> {
        &self.handle
    }

    /// Run the server loop: read JSON-RPC from stdin, write responses to stdout.
    pub fn run(&mut self) {
        let stdin = io::stdin();
        let stdout = io::stdout();
        let mut stdout = stdout.lock();

        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if let Some(response) = self.handle_line(&line) {
                let _ = writeln!(stdout, "{response}");
                let _ = stdout.flush();
            }
        }
        let _ = self.handle.run(|m| {
            m.shutdown();
            Ok(())
        });
    }

    /// Answer one request line. Blank lines get no response.
    pub fn handle_line(&mut self, line: &str) -> Option<String> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let response = match serde_json::from_str::<RpcRequest>(line) {
            Err(e) => RpcResponse::error(JsonValue::Null, -32700, format!("Parse error: {e}")),
            Ok(request) if request.jsonrpc != "2.0" => {
                RpcResponse::error(request.id, -32600, "Invalid JSON-RPC version".to_string())
            }
            Ok(request) => {
                log::debug!("rpc {}", request.method);
                self.dispatch(&request.method, &request.params, request.id)
            }
        };
        Some(serde_json::to_string(&response).unwrap_or_default())
    }

    fn dispatch(&mut self, method: &str, params: &JsonValue, id: JsonValue) -> RpcResponse {
        match method {
            "boot" => self.handle_boot(params, id),
            "shutdown" => self.handle_shutdown(id),
            "reset" => self.handle_reset(params, id),
            "peek" => self.handle_peek(params, id),
            "poke" => self.handle_poke(params, id),
            "load_block" => self.handle_load_block(params, id),
            "soft_switches" => self.handle_soft_switches(id),
            "capture_frame" => self.handle_capture_frame(params, id),
            "get_screen_text" => self.handle_get_screen_text(id),
            "tokenize" => self.handle_tokenize(params, id),
            "compare_tokenization" => self.handle_compare_tokenization(params, id),
            "inject_program" => self.handle_inject_program(params, id),
            "basic_pointers" => self.handle_basic_pointers(id),
            "registers" => self.handle_registers(id),
            "cursor" => self.handle_cursor(id),
            "type_line" => self.handle_type_line(params, id),
            "send_key" => self.handle_send_key(params, id),
            "read_gr_ascii" => self.handle_read_ascii(DisplayMode::LoRes, params, id),
            "read_dgr_ascii" => self.handle_read_ascii(DisplayMode::DoubleLoRes, params, id),
            "read_hgr_ascii" => self.handle_read_ascii(DisplayMode::HiRes, params, id),
            "read_dhgr_ascii" => self.handle_read_ascii(DisplayMode::DoubleHiRes, params, id),
            "clear_gr" => self.handle_clear_gr(params, id),
            "clear_hgr" => self.handle_clear_hgr(params, id),
            "run_and_capture" => self.handle_run_and_capture(params, id),
            "send_keys_and_capture" => self.handle_send_keys_and_capture(params, id),
            "type_and_capture" => self.handle_type_and_capture(params, id),
            "save_snapshot" => self.handle_save_snapshot(params, id),
            "restore_snapshot" => self.handle_restore_snapshot(params, id),
            _ => RpcResponse::error(id, -32601, format!("Unknown method: {method}")),
        }
    }

    // === Tool handlers ===

    fn handle_boot(&mut self, params: &JsonValue, id: JsonValue) -> RpcResponse {
        let machine = match params.get("machine").and_then(JsonValue::as_str) {
            Some(name) => match name.parse::<Machine>() {
                Ok(m) => Some(m),
                Err(e) => return RpcResponse::error(id, -32602, e),
            },
            None => None,
        };
        let disk = params.get("disk").and_then(JsonValue::as_str).map(PathBuf::from);
        let result = self.handle.run(|m| {
            if machine.is_some() || disk.is_some() {
                m.boot_with(machine.unwrap_or(m.machine()), disk)?;
            } else {
                m.boot()?;
            }
            Ok(serde_json::json!({"status": "ok", "machine": m.machine().to_string()}))
        });
        RpcResponse::from_result(id, result)
    }

    fn handle_shutdown(&mut self, id: JsonValue) -> RpcResponse {
        let result = self.handle.run(|m| {
            m.shutdown();
            Ok(serde_json::json!({"status": "ok"}))
        });
        RpcResponse::from_result(id, result)
    }

    fn handle_reset(&mut self, params: &JsonValue, id: JsonValue) -> RpcResponse {
        let cold = params.get("cold").and_then(JsonValue::as_bool).unwrap_or(false);
        let result = self.handle.run(|m| {
            m.reset(cold)?;
            Ok(serde_json::json!({"status": "ok", "cold": cold}))
        });
        RpcResponse::from_result(id, result)
    }

    fn handle_peek(&mut self, params: &JsonValue, id: JsonValue) -> RpcResponse {
        let address = match required_u16(params, "address") {
            Ok(a) => a,
            Err(e) => return RpcResponse::error(id, -32602, e),
        };
        let count = match params.get("count") {
            None => 1,
            Some(v) => match v.as_u64() {
                Some(n) if (1..=0x1_0000).contains(&n) => n as usize,
                _ => return RpcResponse::error(id, -32602, "Invalid 'count' (1-65536)".to_string()),
            },
        };
        let bank = match param_bank(params) {
            Ok(b) => b,
            Err(e) => return RpcResponse::error(id, -32602, e),
        };
        let result = self.handle.run(|m| {
            let bytes = match bank {
                Some(bank) => m.read_bank(bank, address, count)?,
                None => m.peek(address, count)?,
            };
            Ok(serde_json::json!({
                "address": format!("${address:04X}"),
                "hex": hex_string(&bytes),
                "bytes": bytes,
            }))
        });
        RpcResponse::from_result(id, result)
    }

    fn handle_poke(&mut self, params: &JsonValue, id: JsonValue) -> RpcResponse {
        let address = match required_u16(params, "address") {
            Ok(a) => a,
            Err(e) => return RpcResponse::error(id, -32602, e),
        };
        let bytes = match param_bytes(params) {
            Ok(b) => b,
            Err(e) => return RpcResponse::error(id, -32602, e),
        };
        let bank = match param_bank(params) {
            Ok(b) => b,
            Err(e) => return RpcResponse::error(id, -32602, e),
        };
        let result = self.handle.run(|m| {
            match bank {
                Some(bank) => m.write_bank(bank, address, &bytes)?,
                None => m.poke(address, &bytes)?,
            }
            Ok(serde_json::json!({"address": format!("${address:04X}"), "length": bytes.len()}))
        });
        RpcResponse::from_result(id, result)
    }

    fn handle_load_block(&mut self, params: &JsonValue, id: JsonValue) -> RpcResponse {
        let address = match required_u16(params, "address") {
            Ok(a) => a,
            Err(e) => return RpcResponse::error(id, -32602, e),
        };
        let bytes = match param_bytes(params) {
            Ok(b) => b,
            Err(e) => return RpcResponse::error(id, -32602, e),
        };
        let result = self.handle.run(|m| {
            m.load_block(address, &bytes)?;
            Ok(serde_json::json!({"address": format!("${address:04X}"), "length": bytes.len()}))
        });
        RpcResponse::from_result(id, result)
    }

    fn handle_soft_switches(&mut self, id: JsonValue) -> RpcResponse {
        let result = self.handle.run(Apple2::soft_switches);
        RpcResponse::from_result(id, result)
    }

    fn handle_capture_frame(&mut self, params: &JsonValue, id: JsonValue) -> RpcResponse {
        let mode = match params.get("mode").and_then(JsonValue::as_str) {
            None => None,
            Some(name) => match name.parse::<DisplayMode>() {
                Ok(mode) => Some(mode),
                Err(e) => return RpcResponse::error(id, -32602, e),
            },
        };
        let page = match param_page(params) {
            Ok(p) => p,
            Err(e) => return RpcResponse::error(id, -32602, e),
        };
        let result = self.handle.run(|m| {
            let frame = match mode {
                Some(mode) => m.capture_frame(mode, page)?,
                None => m.capture_current()?,
            };
            let mut json = serde_json::json!({
                "mode": frame.mode,
                "page": frame.page,
                "width": frame.width,
                "height": frame.height,
                "data": base64::engine::general_purpose::STANDARD.encode(frame.cells()),
            });
            if let Some(lines) = frame.text_lines() {
                json["lines"] = serde_json::json!(lines);
            } else {
                let (colours, names) = frame.palette();
                json["palette"] = serde_json::json!(colours);
                json["palette_names"] = serde_json::json!(names);
            }
            Ok(json)
        });
        RpcResponse::from_result(id, result)
    }

    fn handle_get_screen_text(&mut self, id: JsonValue) -> RpcResponse {
        let result = self.handle.run(|m| {
            let lines = m.get_screen_text()?;
            Ok(serde_json::json!({"text": lines.join("\n"), "lines": lines}))
        });
        RpcResponse::from_result(id, result)
    }

    fn handle_tokenize(&mut self, params: &JsonValue, id: JsonValue) -> RpcResponse {
        let Some(source) = params.get("source").and_then(JsonValue::as_str) else {
            return RpcResponse::error(id, -32602, "Missing 'source'".to_string());
        };
        let mode = match params.get("mode").and_then(JsonValue::as_str) {
            None | Some("live") => TokenizeMode::Live,
            Some("process") => TokenizeMode::Process,
            Some(other) => {
                return RpcResponse::error(id, -32602, format!("Invalid 'mode': {other}"));
            }
        };
        let emulator = self.emulator.clone();
        let result = self.handle.run(|m| {
            let tokenized = m.tokenize_with(source, mode, &emulator)?;
            Ok(serde_json::json!({
                "start": format!("${:04X}", tokenized.image.start_address()),
                "length": tokenized.bytes().len(),
                "hex": tokenized.hex(),
                "listing": list(&tokenized.image)?,
                "annotation": annotate(tokenized.bytes()),
            }))
        });
        RpcResponse::from_result(id, result)
    }

    fn handle_compare_tokenization(&mut self, params: &JsonValue, id: JsonValue) -> RpcResponse {
        let Some(source) = params.get("source").and_then(JsonValue::as_str) else {
            return RpcResponse::error(id, -32602, "Missing 'source'".to_string());
        };
        let candidate = match params.get("candidate") {
            Some(JsonValue::String(hex)) => parse_hex(hex),
            Some(JsonValue::Array(items)) => byte_array(items),
            _ => Err("Missing 'candidate' (hex string or byte array)".to_string()),
        };
        let candidate = match candidate {
            Ok(c) => c,
            Err(e) => return RpcResponse::error(id, -32602, e),
        };
        let result = self.handle.run(|m| {
            let diff = m.compare_tokenization(source, &candidate)?;
            Ok(serde_json::json!({
                "match": diff.is_match(),
                "first_divergence": diff.first_divergence,
                "differences": diff.differences,
                "kind": diff.kind.map(|k| k.to_string()),
                "explanation": diff.explanation,
            }))
        });
        RpcResponse::from_result(id, result)
    }

    fn handle_inject_program(&mut self, params: &JsonValue, id: JsonValue) -> RpcResponse {
        let bytes = match param_bytes(params) {
            Ok(b) => b,
            Err(e) => return RpcResponse::error(id, -32602, e),
        };
        let start = match param_u16(params, "start") {
            Ok(s) => s.unwrap_or(apple2_memory::constants::DEFAULT_PROGRAM_START),
            Err(e) => return RpcResponse::error(id, -32602, e),
        };
        let load_address = match param_u16(params, "load_address") {
            Ok(a) => a,
            Err(e) => return RpcResponse::error(id, -32602, e),
        };
        let ceiling = match param_u16(params, "ceiling") {
            Ok(c) => c,
            Err(e) => return RpcResponse::error(id, -32602, e),
        };
        let flag = |key: &str, default: bool| params.get(key).and_then(JsonValue::as_bool).unwrap_or(default);
        let options = InjectOptions {
            load_address,
            update_pointers: flag("update_pointers", true),
            auto_run: flag("auto_run", false),
            allow_overflow: flag("allow_overflow", false),
            ceiling,
        };
        let result = self.handle.run(|m| {
            let image = ProgramImage::new(start, bytes)?;
            m.inject(&image, &options)
        });
        RpcResponse::from_result(id, result)
    }

    fn handle_basic_pointers(&mut self, id: JsonValue) -> RpcResponse {
        let result = self.handle.run(Apple2::basic_pointers);
        RpcResponse::from_result(id, result)
    }

    fn handle_registers(&mut self, id: JsonValue) -> RpcResponse {
        let result = self.handle.run(Apple2::registers);
        RpcResponse::from_result(id, result)
    }

    fn handle_cursor(&mut self, id: JsonValue) -> RpcResponse {
        let result = self.handle.run(|m| {
            let (column, row) = m.cursor()?;
            Ok(serde_json::json!({"column": column, "row": row}))
        });
        RpcResponse::from_result(id, result)
    }

    fn handle_type_line(&mut self, params: &JsonValue, id: JsonValue) -> RpcResponse {
        let Some(text) = params.get("text").and_then(JsonValue::as_str) else {
            return RpcResponse::error(id, -32602, "Missing 'text'".to_string());
        };
        let result = self.handle.run(|m| {
            let output = m.type_line(text)?;
            Ok(serde_json::json!({"output": output}))
        });
        RpcResponse::from_result(id, result)
    }

    fn handle_send_key(&mut self, params: &JsonValue, id: JsonValue) -> RpcResponse {
        let key = match params.get("key").and_then(JsonValue::as_str) {
            Some(name) => match name.parse::<Key>() {
                Ok(k) => k,
                Err(e) => return RpcResponse::error(id, -32602, e),
            },
            None => return RpcResponse::error(id, -32602, "Missing 'key'".to_string()),
        };
        let settle = match param_delay(params) {
            Ok(d) => d,
            Err(e) => return RpcResponse::error(id, -32602, e),
        };
        let result = self.handle.run(|m| {
            let output = m.send_key(key, settle)?;
            Ok(serde_json::json!({"key": key.name(), "output": output}))
        });
        RpcResponse::from_result(id, result)
    }

    fn handle_read_ascii(&mut self, mode: DisplayMode, params: &JsonValue, id: JsonValue) -> RpcResponse {
        let page = match param_page(params) {
            Ok(p) => p,
            Err(e) => return RpcResponse::error(id, -32602, e),
        };
        let result = self.handle.run(|m| {
            let frame = m.capture_frame(mode, page)?;
            let lines = frame.ascii_art();
            Ok(serde_json::json!({
                "mode": frame.mode,
                "page": frame.page,
                "width": frame.width,
                "height": frame.height,
                "text": lines.join("\n"),
                "lines": lines,
            }))
        });
        RpcResponse::from_result(id, result)
    }

    fn handle_clear_gr(&mut self, params: &JsonValue, id: JsonValue) -> RpcResponse {
        let colour = match params.get("color") {
            None => 0,
            Some(v) => match v.as_u64() {
                Some(c) if c <= 15 => c as u8,
                _ => return RpcResponse::error(id, -32602, "Invalid 'color' (0-15)".to_string()),
            },
        };
        let result = self.handle.run(|m| {
            m.clear_lores(colour)?;
            Ok(serde_json::json!({"status": "ok", "color": colour}))
        });
        RpcResponse::from_result(id, result)
    }

    fn handle_clear_hgr(&mut self, params: &JsonValue, id: JsonValue) -> RpcResponse {
        let page = match param_page(params) {
            Ok(p) => p,
            Err(e) => return RpcResponse::error(id, -32602, e),
        };
        let result = self.handle.run(|m| {
            m.clear_hires(page)?;
            Ok(serde_json::json!({"status": "ok", "page": page}))
        });
        RpcResponse::from_result(id, result)
    }

    fn handle_run_and_capture(&mut self, params: &JsonValue, id: JsonValue) -> RpcResponse {
        let command = params.get("command").and_then(JsonValue::as_str).unwrap_or("RUN");
        let timeout = match params.get("timeout") {
            None => None,
            Some(v) => match v.as_f64() {
                Some(secs) if secs > 0.0 && secs.is_finite() => Some(Duration::from_secs_f64(secs)),
                _ => return RpcResponse::error(id, -32602, "Invalid 'timeout' (seconds)".to_string()),
            },
        };
        let mode = match param_capture_mode(params) {
            Ok(m) => m,
            Err(e) => return RpcResponse::error(id, -32602, e),
        };
        let result = self.handle.run(|m| {
            let timeout = timeout.unwrap_or(m.session().config().run_timeout);
            let (output, frame) = m.run_and_capture(command, timeout, mode)?;
            Ok(serde_json::json!({
                "command": command,
                "output": output,
                "mode": frame.mode,
                "screen": frame.ascii_art(),
            }))
        });
        RpcResponse::from_result(id, result)
    }

    fn handle_send_keys_and_capture(&mut self, params: &JsonValue, id: JsonValue) -> RpcResponse {
        let Some(keys) = params.get("keys").and_then(JsonValue::as_str) else {
            return RpcResponse::error(id, -32602, "Missing 'keys'".to_string());
        };
        let settle = match param_delay(params) {
            Ok(d) => d,
            Err(e) => return RpcResponse::error(id, -32602, e),
        };
        let mode = match param_capture_mode(params) {
            Ok(m) => m,
            Err(e) => return RpcResponse::error(id, -32602, e),
        };
        let result = self.handle.run(|m| {
            let (output, frame) = m.send_keys_and_capture(keys, settle, mode)?;
            Ok(serde_json::json!({
                "keys": keys.to_ascii_uppercase(),
                "output": output,
                "mode": frame.mode,
                "screen": frame.ascii_art(),
            }))
        });
        RpcResponse::from_result(id, result)
    }

    fn handle_type_and_capture(&mut self, params: &JsonValue, id: JsonValue) -> RpcResponse {
        let Some(line) = params.get("basic_line").and_then(JsonValue::as_str) else {
            return RpcResponse::error(id, -32602, "Missing 'basic_line'".to_string());
        };
        let result = self.handle.run(|m| {
            let tokenized = m.tokenize(line)?;
            Ok(serde_json::json!({
                "typed": line,
                "length": tokenized.bytes().len(),
                "hex": tokenized.hex(),
                "annotation": annotate(tokenized.bytes()),
            }))
        });
        RpcResponse::from_result(id, result)
    }

    fn handle_save_snapshot(&mut self, params: &JsonValue, id: JsonValue) -> RpcResponse {
        let Some(name) = params.get("name").and_then(JsonValue::as_str) else {
            return RpcResponse::error(id, -32602, "Missing 'name'".to_string());
        };
        let result = self.handle.run(|m| {
            let path = m.save_snapshot(name)?;
            Ok(serde_json::json!({"name": name, "path": path.display().to_string()}))
        });
        RpcResponse::from_result(id, result)
    }

    fn handle_restore_snapshot(&mut self, params: &JsonValue, id: JsonValue) -> RpcResponse {
        let Some(name) = params.get("name").and_then(JsonValue::as_str) else {
            return RpcResponse::error(id, -32602, "Missing 'name'".to_string());
        };
        let result = self.handle.run(|m| {
            let snapshot = m.restore_snapshot(name)?;
            Ok(serde_json::json!({
                "name": snapshot.name,
                "machine": snapshot.machine,
                "registers": snapshot.registers,
                "aux": snapshot.aux.is_some(),
            }))
        });
        RpcResponse::from_result(id, result)
    }

    /// Run a script file: read a JSON array of simplified RPC requests, dispatch
    /// each in order, and write JSON-line responses to stdout.
    pub fn run_script(&mut self, path: &Path) -> io::Result<()> {
        let data = std::fs::read_to_string(path)?;
        let steps: Vec<ScriptStep> = serde_json::from_str(&data)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let stdout = io::stdout();
        let mut stdout = stdout.lock();

        for (i, step) in steps.iter().enumerate() {
            let id = JsonValue::from(i as u64 + 1);
            let params = step.params.clone().unwrap_or(JsonValue::Object(serde_json::Map::new()));
            let response = self.dispatch(&step.method, &params, id);

            let _ = writeln!(stdout, "{}", serde_json::to_string(&response).unwrap_or_default());
            let _ = stdout.flush();

            if let Some(save_path) = params.get("save_path").and_then(JsonValue::as_str)
                && let Some(data_b64) = response
                    .result
                    .as_ref()
                    .and_then(|r| r.get("data"))
                    .and_then(JsonValue::as_str)
            {
                match save_capture_data(save_path, data_b64) {
                    Ok(()) => log::info!("saved {save_path}"),
                    Err(e) => log::error!("failed to save {save_path}: {e}"),
                }
            }
        }

        let _ = self.handle.run(|m| {
            m.shutdown();
            Ok(())
        });
        Ok(())
    }
}

/// A single step in a script file.
#[derive(Deserialize)]
struct ScriptStep {
    method: String,
    #[serde(default)]
    params: Option<JsonValue>,
}

/// Decode base64 capture data and write to a file.
fn save_capture_data(path: &str, data_b64: &str) -> io::Result<()> {
    if data_b64.is_empty() {
        return Ok(());
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data_b64)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, bytes)
}

// ---------------------------------------------------------------------------
// Parameter helpers
// ---------------------------------------------------------------------------

/// Parse `2049`, `"2049"`, `"$0801"` or `"0x0801"`.
fn parse_address(value: &JsonValue) -> std::result::Result<u16, String> {
    let parsed = match value {
        JsonValue::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        JsonValue::String(s) => {
            let s = s.trim();
            if let Some(hex) = s.strip_prefix('$').or_else(|| s.strip_prefix("0x")) {
                u16::from_str_radix(hex, 16).ok()
            } else {
                s.parse::<u16>().ok()
            }
        }
        _ => None,
    };
    parsed.ok_or_else(|| format!("Invalid address {value} (0-65535, $hex or 0xhex)"))
}

fn param_u16(params: &JsonValue, key: &str) -> std::result::Result<Option<u16>, String> {
    params
        .get(key)
        .map(|v| parse_address(v).map_err(|e| format!("'{key}': {e}")))
        .transpose()
}

fn required_u16(params: &JsonValue, key: &str) -> std::result::Result<u16, String> {
    param_u16(params, key)?.ok_or_else(|| format!("Missing '{key}'"))
}

fn param_bank(params: &JsonValue) -> std::result::Result<Option<Bank>, String> {
    match params.get("bank").and_then(JsonValue::as_str) {
        None => Ok(None),
        Some("main") => Ok(Some(Bank::Main)),
        Some("aux") => Ok(Some(Bank::Aux)),
        Some(other) => Err(format!("Invalid 'bank': {other} (main or aux)")),
    }
}

fn param_page(params: &JsonValue) -> std::result::Result<Page, String> {
    match params.get("page") {
        None => Ok(Page::One),
        Some(v) => match v.as_u64() {
            Some(1) => Ok(Page::One),
            Some(2) => Ok(Page::Two),
            _ => Err("Invalid 'page' (1 or 2)".to_string()),
        },
    }
}

/// `delay_ms`, 10 to 5000, defaulting to [`DEFAULT_SETTLE`].
fn param_delay(params: &JsonValue) -> std::result::Result<Duration, String> {
    match params.get("delay_ms") {
        None => Ok(DEFAULT_SETTLE),
        Some(v) => match v.as_u64() {
            Some(ms) if (10..=5000).contains(&ms) => Ok(Duration::from_millis(ms)),
            _ => Err("Invalid 'delay_ms' (10-5000)".to_string()),
        },
    }
}

/// `capture_mode`: any display mode name, lo-res when absent.
fn param_capture_mode(params: &JsonValue) -> std::result::Result<DisplayMode, String> {
    match params.get("capture_mode") {
        None => Ok(DisplayMode::LoRes),
        Some(v) => v
            .as_str()
            .ok_or_else(|| "Invalid 'capture_mode'".to_string())?
            .parse(),
    }
}

fn parse_hex(text: &str) -> std::result::Result<Vec<u8>, String> {
    let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if !digits.is_ascii() {
        return Err("Hex data must be ASCII".to_string());
    }
    if digits.len() % 2 != 0 {
        return Err("Hex data has an odd number of digits".to_string());
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| format!("Invalid hex at digit {i}: {}", &digits[i..i + 2]))
        })
        .collect()
}

fn byte_array(items: &[JsonValue]) -> std::result::Result<Vec<u8>, String> {
    items
        .iter()
        .map(|v| {
            v.as_u64()
                .and_then(|n| u8::try_from(n).ok())
                .ok_or_else(|| format!("Invalid byte {v} (0-255)"))
        })
        .collect()
}

/// Bytes from `bytes` (array), `hex`, `data` (base64) or `path`.
fn param_bytes(params: &JsonValue) -> std::result::Result<Vec<u8>, String> {
    let bytes = if let Some(items) = params.get("bytes").and_then(JsonValue::as_array) {
        byte_array(items)?
    } else if let Some(hex) = params.get("hex").and_then(JsonValue::as_str) {
        parse_hex(hex)?
    } else if let Some(b64) = params.get("data").and_then(JsonValue::as_str) {
        base64::engine::general_purpose::STANDARD
            .decode(b64)
            .map_err(|e| format!("Invalid base64: {e}"))?
    } else if let Some(path) = params.get("path").and_then(JsonValue::as_str) {
        std::fs::read(path).map_err(|e| format!("Cannot read file: {e}"))?
    } else {
        return Err("Provide 'bytes', 'hex', 'data' (base64) or 'path'".to_string());
    };
    if bytes.is_empty() {
        return Err("No bytes given".to_string());
    }
    Ok(bytes)
}

fn hex_string(bytes: &[u8]) -> String {
    let hex: Vec<String> = bytes.iter().map(|b| format!("{b:02X}")).collect();
    hex.join(" ")
}
