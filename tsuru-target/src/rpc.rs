//! JSON-lines RPC クライアント
//!
//! ヘッドレスのデバッガバックエンドにTCPで接続し、[`TargetControl`] を実装します。
//!
//! 1行1メッセージのJSONで、リクエストは `{"id", "method", "params"}`、
//! レスポンスは `{"id", "result", "error", "more"}` です。
//! 実行制御の呼び出しは停止のたびに `more: true` のレスポンスを返し、
//! 最後のレスポンスだけ `more: false` になります。

use crate::api::{
    AsmFlavour, AsmInstruction, Breakpoint, Checkpoint, DebuggerState, DiscardedBreakpoint,
    EvalScope, Goroutine, LoadConfig, Location, Stackframe, Thread, Variable,
};
use crate::stream::StateSender;
use crate::{Result, StateStream, TargetControl, TargetError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::SystemTime;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct Request<'a> {
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct Response {
    id: u64,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<TargetError>,
    #[serde(default)]
    more: bool,
}

/// 応答待ちのリクエスト
enum Pending {
    Call(Sender<Response>),
    Stream(StateSender),
}

/// 応答待ち表（接続が切れたら `None`）
type PendingMap = Arc<Mutex<Option<HashMap<u64, Pending>>>>;

/// RPC クライアント
pub struct RpcClient {
    writer: TcpStream,
    pending: PendingMap,
    next_id: u64,
    pid: i32,
    recorded: bool,
    last_modified: Option<SystemTime>,
}

impl RpcClient {
    /// バックエンドに接続する
    ///
    /// 接続時に一度だけ、記録プロセスかどうかなどの属性を問い合わせます。
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let writer = TcpStream::connect(addr)?;
        let reader = BufReader::new(writer.try_clone()?);
        let pending: PendingMap = Arc::new(Mutex::new(Some(HashMap::new())));

        let demux = Arc::clone(&pending);
        thread::spawn(move || read_loop(reader, demux));

        let mut client = Self {
            writer,
            pending,
            next_id: 1,
            pid: 0,
            recorded: false,
            last_modified: None,
        };
        client.recorded = client.call("Recorded", Value::Null)?;
        client.pid = client.call("ProcessPid", Value::Null)?;
        client.last_modified = client.call("LastModified", Value::Null)?;
        debug!(pid = client.pid, recorded = client.recorded, "connected to target");
        Ok(client)
    }

    fn register(&mut self, pending: Pending) -> Result<u64> {
        let id = self.next_id;
        self.next_id += 1;
        let mut guard = self
            .pending
            .lock()
            .map_err(|_| anyhow::anyhow!("rpc connection state poisoned"))?;
        let map = guard
            .as_mut()
            .ok_or(TargetError::ConnectionClosed)?;
        map.insert(id, pending);
        Ok(id)
    }

    fn send(&mut self, id: u64, method: &str, params: Value) -> Result<()> {
        let request = Request { id, method, params };
        let mut line = serde_json::to_string(&request)?;
        line.push('\n');
        debug!(id, method, "rpc request");
        if let Err(e) = self
            .writer
            .write_all(line.as_bytes())
            .and_then(|_| self.writer.flush())
        {
            if let Ok(mut guard) = self.pending.lock() {
                if let Some(map) = guard.as_mut() {
                    map.remove(&id);
                }
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// 1往復の呼び出し
    fn call<R: DeserializeOwned>(&mut self, method: &str, params: Value) -> Result<R> {
        let (tx, rx): (Sender<Response>, Receiver<Response>) = mpsc::channel();
        let id = self.register(Pending::Call(tx))?;
        self.send(id, method, params)?;
        let response = rx.recv().map_err(|_| {
            debug!(method, "connection closed while waiting for response");
            TargetError::ConnectionClosed
        })?;
        if let Some(err) = response.error {
            return Err(err.into());
        }
        Ok(serde_json::from_value(response.result)?)
    }

    /// 状態ストリームを返す呼び出し
    fn call_stream(&mut self, method: &str) -> StateStream {
        let (tx, stream) = StateStream::channel();
        let id = match self.register(Pending::Stream(tx)) {
            Ok(id) => id,
            Err(e) => {
                return match e.downcast::<TargetError>() {
                    Ok(err) => StateStream::failed_with(err),
                    Err(e) => StateStream::failed(e.to_string()),
                }
            }
        };
        if let Err(e) = self.send(id, method, Value::Null) {
            return StateStream::failed(e.to_string());
        }
        stream
    }
}

/// 受信ループ
///
/// レスポンスをIDで振り分けます。接続が切れたら、待っている全ストリームに
/// 切断エラーの状態を送ってから閉じます。
fn read_loop(mut reader: BufReader<TcpStream>, pending: PendingMap) {
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("rpc read failed: {}", e);
                break;
            }
        }
        if line.trim().is_empty() {
            continue;
        }
        let response: Response = match serde_json::from_str(line.trim()) {
            Ok(r) => r,
            Err(e) => {
                warn!("malformed rpc response: {}", e);
                continue;
            }
        };
        let Ok(mut guard) = pending.lock() else { break };
        if let Some(map) = guard.as_mut() {
            deliver(map, response);
        }
    }

    let closed = pending.lock().ok().and_then(|mut guard| guard.take());
    if let Some(map) = closed {
        for (_, waiter) in map {
            if let Pending::Stream(tx) = waiter {
                tx.send(DebuggerState::from_error(TargetError::ConnectionClosed));
            }
        }
    }
}

fn deliver(map: &mut HashMap<u64, Pending>, response: Response) {
    let id = response.id;
    match map.remove(&id) {
        Some(Pending::Call(tx)) => {
            let _ = tx.send(response);
        }
        Some(Pending::Stream(tx)) => {
            let more = response.more;
            let state = match response.error {
                Some(err) => DebuggerState::from_error(err),
                None => serde_json::from_value(response.result).unwrap_or_else(|e| DebuggerState {
                    err: Some(format!("malformed state: {}", e)),
                    ..Default::default()
                }),
            };
            let delivered = tx.send(state);
            if more && delivered {
                map.insert(id, Pending::Stream(tx));
            }
        }
        None => debug!(id, "response for unknown request dropped"),
    }
}

impl TargetControl for RpcClient {
    fn process_pid(&self) -> i32 {
        self.pid
    }

    fn last_modified(&self) -> Option<SystemTime> {
        self.last_modified
    }

    fn recorded(&self) -> bool {
        self.recorded
    }

    fn detach(&mut self, kill: bool) -> Result<()> {
        self.call::<Value>("Detach", json!({ "kill": kill }))?;
        Ok(())
    }

    fn restart_from(&mut self, pos: &str) -> Result<Vec<DiscardedBreakpoint>> {
        let discarded: Vec<DiscardedBreakpoint> = self.call("Restart", json!({ "position": pos }))?;
        self.pid = self.call("ProcessPid", Value::Null)?;
        Ok(discarded)
    }

    fn get_state(&mut self) -> Result<DebuggerState> {
        self.call("State", Value::Null)
    }

    fn continue_execution(&mut self) -> StateStream {
        self.call_stream("Continue")
    }

    fn rewind(&mut self) -> StateStream {
        self.call_stream("Rewind")
    }

    fn step(&mut self) -> StateStream {
        self.call_stream("Step")
    }

    fn step_instruction(&mut self) -> StateStream {
        self.call_stream("StepInstruction")
    }

    fn next(&mut self) -> StateStream {
        self.call_stream("Next")
    }

    fn step_out(&mut self) -> StateStream {
        self.call_stream("StepOut")
    }

    fn switch_thread(&mut self, thread_id: i64) -> Result<DebuggerState> {
        self.call("SwitchThread", json!({ "thread_id": thread_id }))
    }

    fn switch_goroutine(&mut self, goroutine_id: i64) -> Result<DebuggerState> {
        self.call("SwitchGoroutine", json!({ "goroutine_id": goroutine_id }))
    }

    fn list_threads(&mut self) -> Result<Vec<Thread>> {
        self.call("ListThreads", Value::Null)
    }

    fn list_goroutines(&mut self) -> Result<Vec<Goroutine>> {
        self.call("ListGoroutines", Value::Null)
    }

    fn create_breakpoint(&mut self, bp: &Breakpoint) -> Result<Breakpoint> {
        self.call("CreateBreakpoint", json!({ "breakpoint": bp }))
    }

    fn amend_breakpoint(&mut self, bp: &Breakpoint) -> Result<()> {
        self.call::<Value>("AmendBreakpoint", json!({ "breakpoint": bp }))?;
        Ok(())
    }

    fn clear_breakpoint(&mut self, id: i64) -> Result<Breakpoint> {
        self.call("ClearBreakpoint", json!({ "id": id }))
    }

    fn clear_breakpoint_by_name(&mut self, name: &str) -> Result<Breakpoint> {
        self.call("ClearBreakpoint", json!({ "name": name }))
    }

    fn list_breakpoints(&mut self) -> Result<Vec<Breakpoint>> {
        self.call("ListBreakpoints", Value::Null)
    }

    fn get_breakpoint(&mut self, id: i64) -> Result<Breakpoint> {
        self.call("GetBreakpoint", json!({ "id": id }))
    }

    fn get_breakpoint_by_name(&mut self, name: &str) -> Result<Breakpoint> {
        self.call("GetBreakpoint", json!({ "name": name }))
    }

    fn find_location(&mut self, scope: EvalScope, locspec: &str) -> Result<Vec<Location>> {
        self.call("FindLocation", json!({ "scope": scope, "loc": locspec }))
    }

    fn checkpoint(&mut self, where_: &str) -> Result<i64> {
        self.call("Checkpoint", json!({ "where": where_ }))
    }

    fn list_checkpoints(&mut self) -> Result<Vec<Checkpoint>> {
        self.call("ListCheckpoints", Value::Null)
    }

    fn clear_checkpoint(&mut self, id: i64) -> Result<()> {
        self.call::<Value>("ClearCheckpoint", json!({ "id": id }))?;
        Ok(())
    }

    fn eval_variable(
        &mut self,
        scope: EvalScope,
        expr: &str,
        cfg: LoadConfig,
    ) -> Result<Variable> {
        self.call("Eval", json!({ "scope": scope, "expr": expr, "cfg": cfg }))
    }

    fn set_variable(&mut self, scope: EvalScope, symbol: &str, value: &str) -> Result<()> {
        self.call::<Value>(
            "Set",
            json!({ "scope": scope, "symbol": symbol, "value": value }),
        )?;
        Ok(())
    }

    fn list_function_args(&mut self, scope: EvalScope, cfg: LoadConfig) -> Result<Vec<Variable>> {
        self.call("ListFunctionArgs", json!({ "scope": scope, "cfg": cfg }))
    }

    fn list_local_variables(
        &mut self,
        scope: EvalScope,
        cfg: LoadConfig,
    ) -> Result<Vec<Variable>> {
        self.call("ListLocalVars", json!({ "scope": scope, "cfg": cfg }))
    }

    fn list_package_variables(&mut self, filter: &str, cfg: LoadConfig) -> Result<Vec<Variable>> {
        self.call("ListPackageVars", json!({ "filter": filter, "cfg": cfg }))
    }

    fn stacktrace(
        &mut self,
        goroutine_id: i64,
        depth: i64,
        cfg: Option<LoadConfig>,
    ) -> Result<Vec<Stackframe>> {
        self.call(
            "Stacktrace",
            json!({ "id": goroutine_id, "depth": depth, "cfg": cfg }),
        )
    }

    fn list_registers(&mut self, thread_id: i64, include_fp: bool) -> Result<String> {
        self.call(
            "ListRegisters",
            json!({ "thread_id": thread_id, "include_fp": include_fp }),
        )
    }

    fn list_sources(&mut self, filter: &str) -> Result<Vec<String>> {
        self.call("ListSources", json!({ "filter": filter }))
    }

    fn list_functions(&mut self, filter: &str) -> Result<Vec<String>> {
        self.call("ListFunctions", json!({ "filter": filter }))
    }

    fn list_types(&mut self, filter: &str) -> Result<Vec<String>> {
        self.call("ListTypes", json!({ "filter": filter }))
    }

    fn disassemble_pc(
        &mut self,
        scope: EvalScope,
        pc: u64,
        flavour: AsmFlavour,
    ) -> Result<Vec<AsmInstruction>> {
        self.call(
            "Disassemble",
            json!({ "scope": scope, "start_pc": pc, "end_pc": 0, "flavour": flavour }),
        )
    }

    fn disassemble_range(
        &mut self,
        scope: EvalScope,
        start: u64,
        end: u64,
        flavour: AsmFlavour,
    ) -> Result<Vec<AsmInstruction>> {
        self.call(
            "Disassemble",
            json!({ "scope": scope, "start_pc": start, "end_pc": end, "flavour": flavour }),
        )
    }
}
