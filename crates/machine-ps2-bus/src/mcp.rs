//! MCP (Model Context Protocol) server for the PS/2 bus machine.
//!
//! Exposes the machine as a JSON-RPC 2.0 server over stdin/stdout so
//! scripts can drive bus cycles, send PS/2 frames, and inspect state.
//!
//! # Protocol
//!
//! Reads newline-delimited JSON-RPC 2.0 requests from stdin, writes
//! responses to stdout. Times are given and reported in microseconds.

use std::io::{self, BufRead, Write};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use peripheral_ps2_bus::{FrameError, Polarity};
use sim_core::{Observable, SimTime, Value};

use crate::{FrameFault, MachineConfig, MachineError, Ps2BusMachine};

/// Default `wait_interrupt` limit.
const DEFAULT_WAIT_US: u64 = 20_000;

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

    fn machine_error(id: JsonValue, e: MachineError) -> Self {
        Self::error(id, -32000, e.to_string())
    }
}

fn value_to_json(value: Value) -> JsonValue {
    match value {
        Value::Bool(v) => serde_json::json!(v),
        Value::U8(v) => serde_json::json!(v),
        Value::U32(v) => serde_json::json!(v),
        Value::U64(v) => serde_json::json!(v),
        Value::String(v) => serde_json::json!(v),
    }
}

fn frame_result_json(result: Option<Result<u8, FrameError>>) -> JsonValue {
    match result {
        Some(Ok(byte)) => serde_json::json!({"ok": true, "value": byte}),
        Some(Err(e)) => serde_json::json!({"ok": false, "error": e.to_string()}),
        None => JsonValue::Null,
    }
}

/// Read a byte parameter, rejecting anything above 0xFF.
fn byte_param(params: &JsonValue, name: &str) -> Result<u8, String> {
    let raw = params
        .get(name)
        .and_then(JsonValue::as_u64)
        .ok_or_else(|| format!("Missing '{name}' parameter"))?;
    u8::try_from(raw).map_err(|_| format!("'{name}' out of range: {raw}"))
}

fn parse_fault(params: &JsonValue) -> Result<FrameFault, String> {
    match params.get("fault").and_then(|v| v.as_str()) {
        None | Some("none") => Ok(FrameFault::None),
        Some("parity") => Ok(FrameFault::BadParity),
        Some("stop") => Ok(FrameFault::BadStop),
        Some("truncate") => {
            let bits = params.get("bits").and_then(JsonValue::as_u64).unwrap_or(5);
            u8::try_from(bits)
                .map(FrameFault::Truncate)
                .map_err(|_| format!("'bits' out of range: {bits}"))
        }
        Some(other) => Err(format!("Unknown fault: {other}")),
    }
}

/// Apply the optional configuration keys of a `reset` request. Returns
/// `None` when the request carries none.
fn config_from_params(
    base: MachineConfig,
    params: &JsonValue,
) -> Result<Option<MachineConfig>, String> {
    let mut config = base;
    let mut changed = false;

    if let Some(p) = params.get("polarity").and_then(|v| v.as_str()) {
        config.peripheral.polarity = match p {
            "active_high" => Polarity::ActiveHigh,
            "active_low" => Polarity::ActiveLow,
            other => return Err(format!("Unknown polarity: {other}")),
        };
        changed = true;
    }
    for (key, slot) in [
        ("read_wait_states", &mut config.peripheral.read_wait_states),
        ("write_wait_states", &mut config.peripheral.write_wait_states),
    ] {
        if let Some(n) = params.get(key).and_then(JsonValue::as_u64) {
            *slot = u8::try_from(n).map_err(|_| format!("'{key}' out of range: {n}"))?;
            changed = true;
        }
    }
    if let Some(w) = params.get("host_writable").and_then(JsonValue::as_bool) {
        config.peripheral.host_writable = w;
        changed = true;
    }
    if let Some(us) = params.get("frame_timeout_us").and_then(JsonValue::as_u64) {
        config.peripheral.frame_timeout = (us > 0).then(|| SimTime::from_micros(us));
        changed = true;
    }
    Ok(changed.then_some(config))
}

// ---------------------------------------------------------------------------
// MCP Server
// ---------------------------------------------------------------------------

/// MCP server wrapping a headless machine.
pub struct McpServer {
    config: MachineConfig,
    machine: Option<Ps2BusMachine>,
}

impl McpServer {
    #[must_use]
    pub fn new(config: MachineConfig) -> Self {
        Self {
            config,
            machine: None,
        }
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
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let response = self.handle_line(line);
            let _ = writeln!(
                stdout,
                "{}",
                serde_json::to_string(&response).unwrap_or_default()
            );
            let _ = stdout.flush();
        }
    }

    fn handle_line(&mut self, line: &str) -> RpcResponse {
        let request: RpcRequest = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => {
                return RpcResponse::error(JsonValue::Null, -32700, format!("Parse error: {e}"));
            }
        };
        if request.jsonrpc != "2.0" {
            return RpcResponse::error(request.id, -32600, "Invalid JSON-RPC version".to_string());
        }
        self.dispatch(&request.method, &request.params, request.id)
    }

    /// Dispatch a method call to the appropriate handler.
    fn dispatch(&mut self, method: &str, params: &JsonValue, id: JsonValue) -> RpcResponse {
        match method {
            "reset" => self.handle_reset(params, id),
            "run_for" => self.handle_run_for(params, id),
            "bus_write" => self.handle_bus_write(params, id),
            "bus_read" => self.handle_bus_read(id, false),
            "bus_pulse_read" => self.handle_bus_read(id, true),
            "ps2_send" => self.handle_ps2_send(params, id),
            "wait_interrupt" => self.handle_wait_interrupt(params, id),
            "status" => self.handle_status(id),
            "query" => self.handle_query(params, id),
            "query_paths" => self.handle_query_paths(id),
            _ => RpcResponse::error(id, -32601, format!("Unknown method: {method}")),
        }
    }

    /// The machine, created from the server config on first use.
    fn require_machine(&mut self, id: &JsonValue) -> Result<&mut Ps2BusMachine, RpcResponse> {
        if self.machine.is_none() {
            let mut machine = Ps2BusMachine::new(self.config)
                .map_err(|e| RpcResponse::machine_error(id.clone(), e))?;
            machine.reset();
            self.machine = Some(machine);
        }
        self.machine.as_mut().ok_or_else(|| {
            RpcResponse::error(id.clone(), -32000, "No machine instance".to_string())
        })
    }

    // === Tool handlers ===

    fn handle_reset(&mut self, params: &JsonValue, id: JsonValue) -> RpcResponse {
        match config_from_params(self.config, params) {
            Err(msg) => return RpcResponse::error(id, -32602, msg),
            Ok(Some(config)) => {
                if let Err(e) = config.validate() {
                    return RpcResponse::error(id, -32602, e.to_string());
                }
                self.config = config;
                self.machine = None;
            }
            Ok(None) => {
                if let Some(machine) = self.machine.as_mut() {
                    machine.reset();
                }
            }
        }
        match self.require_machine(&id) {
            Ok(m) => {
                let now_us = m.now().as_micros();
                RpcResponse::success(id, serde_json::json!({"status": "ok", "now_us": now_us}))
            }
            Err(e) => e,
        }
    }

    fn handle_run_for(&mut self, params: &JsonValue, id: JsonValue) -> RpcResponse {
        let us = params.get("us").and_then(JsonValue::as_u64).unwrap_or(100);
        let m = match self.require_machine(&id) {
            Ok(m) => m,
            Err(e) => return e,
        };
        m.run_for(SimTime::from_micros(us));
        RpcResponse::success(
            id,
            serde_json::json!({"now_us": m.now().as_micros(), "host_edges": m.host_edges()}),
        )
    }

    fn handle_bus_write(&mut self, params: &JsonValue, id: JsonValue) -> RpcResponse {
        let value = match byte_param(params, "value") {
            Ok(v) => v,
            Err(msg) => return RpcResponse::error(id, -32602, msg),
        };
        let m = match self.require_machine(&id) {
            Ok(m) => m,
            Err(e) => return e,
        };
        match m.write(value) {
            Ok(cycle) => RpcResponse::success(
                id,
                serde_json::json!({"value": cycle.data, "latency": cycle.latency}),
            ),
            Err(e) => RpcResponse::machine_error(id, e),
        }
    }

    fn handle_bus_read(&mut self, id: JsonValue, pulse: bool) -> RpcResponse {
        let m = match self.require_machine(&id) {
            Ok(m) => m,
            Err(e) => return e,
        };
        let result = if pulse { m.pulse_read() } else { m.read() };
        match result {
            Ok(value) => {
                let latency = m.last_cycle().map_or(0, |c| c.latency);
                RpcResponse::success(
                    id,
                    serde_json::json!({
                        "value": value,
                        "latency": latency,
                        "interrupt": m.peripheral().interrupt(),
                    }),
                )
            }
            Err(e) => RpcResponse::machine_error(id, e),
        }
    }

    fn handle_ps2_send(&mut self, params: &JsonValue, id: JsonValue) -> RpcResponse {
        let value = match byte_param(params, "value") {
            Ok(v) => v,
            Err(msg) => return RpcResponse::error(id, -32602, msg),
        };
        let fault = match parse_fault(params) {
            Ok(f) => f,
            Err(msg) => return RpcResponse::error(id, -32602, msg),
        };
        let wait = params.get("wait").and_then(JsonValue::as_bool).unwrap_or(true);

        let m = match self.require_machine(&id) {
            Ok(m) => m,
            Err(e) => return e,
        };
        m.send_frame(value, fault);
        if !wait {
            return RpcResponse::success(
                id,
                serde_json::json!({"queued": m.keyboard().pending() + 1}),
            );
        }
        match m.flush_keyboard() {
            Ok(result) => RpcResponse::success(
                id,
                serde_json::json!({
                    "frame": frame_result_json(result),
                    "interrupt": m.peripheral().interrupt(),
                }),
            ),
            Err(e) => RpcResponse::machine_error(id, e),
        }
    }

    fn handle_wait_interrupt(&mut self, params: &JsonValue, id: JsonValue) -> RpcResponse {
        let us = params
            .get("us")
            .and_then(JsonValue::as_u64)
            .unwrap_or(DEFAULT_WAIT_US);
        let m = match self.require_machine(&id) {
            Ok(m) => m,
            Err(e) => return e,
        };
        match m.wait_for_interrupt(SimTime::from_micros(us)) {
            Ok(at) => RpcResponse::success(
                id,
                serde_json::json!({"interrupt": true, "now_us": at.as_micros()}),
            ),
            Err(e) => RpcResponse::machine_error(id, e),
        }
    }

    fn handle_status(&mut self, id: JsonValue) -> RpcResponse {
        let m = match self.require_machine(&id) {
            Ok(m) => m,
            Err(e) => return e,
        };
        let p = m.peripheral();
        let stats = p.decoder().stats();
        RpcResponse::success(
            id,
            serde_json::json!({
                "now_us": m.now().as_micros(),
                "dtack": p.dtack(),
                "interrupt": p.interrupt(),
                "uo_out": p.uo_out(),
                "data": p.registers().data(),
                "data_ready": p.registers().data_ready(),
                "bus_state": p.bus().state().name(),
                "ps2_state": p.decoder().state().name(),
                "frames": stats.frames,
                "parity_errors": stats.parity_errors,
                "stop_errors": stats.stop_errors,
                "timeouts": stats.timeouts,
                "overruns": p.registers().overruns(),
            }),
        )
    }

    fn handle_query(&mut self, params: &JsonValue, id: JsonValue) -> RpcResponse {
        let Some(path) = params.get("path").and_then(|v| v.as_str()) else {
            return RpcResponse::error(id, -32602, "Missing 'path' parameter".to_string());
        };
        let m = match self.require_machine(&id) {
            Ok(m) => m,
            Err(e) => return e,
        };
        match m.query(path) {
            Some(value) => RpcResponse::success(
                id,
                serde_json::json!({"path": path, "value": value_to_json(value)}),
            ),
            None => RpcResponse::error(id, -32000, format!("Unknown query path: {path}")),
        }
    }

    fn handle_query_paths(&mut self, id: JsonValue) -> RpcResponse {
        let m = match self.require_machine(&id) {
            Ok(m) => m,
            Err(e) => return e,
        };
        RpcResponse::success(id, serde_json::json!({"paths": m.all_query_paths()}))
    }
}

impl Default for McpServer {
    fn default() -> Self {
        Self::new(MachineConfig::default())
    }
}
