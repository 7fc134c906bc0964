//! スクリプト駆動のインメモリターゲット
//!
//! 実プロセスを使わずにコマンド層を検証するためのターゲットです。
//! ブレークポイント表・ロケーション表・変数表をメモリ上に持ち、
//! 実行制御の呼び出しごとにあらかじめ積んだイベント列を状態ストリームとして返します。
//! 同じ内部状態を共有するハンドルを `clone` で取得できるため、
//! `Session` に渡した後もテスト側から状態を検査できます。

use crate::api::{
    AsmFlavour, AsmInstruction, Breakpoint, BreakpointInfo, Checkpoint, DebuggerState,
    DiscardedBreakpoint, EvalScope, Function, Goroutine, LoadConfig, Location, Stackframe, Thread,
    Variable,
};
use crate::{Result, StateStream, TargetControl, TargetError};
use std::cell::{Ref, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::time::SystemTime;

/// 実行制御1回分のストリームを構成するイベント
#[derive(Debug, Clone, PartialEq)]
pub enum FakeEvent {
    /// 指定位置で停止
    Stop {
        location: Location,
        next_in_progress: bool,
    },
    /// ブレークポイントにヒット（遅延アクションを評価する）
    Hit {
        breakpoint: i64,
        goroutine: i64,
        next_in_progress: bool,
    },
    /// エラー状態
    Error(String),
    /// プロセス終了
    Exit(i32),
}

/// FakeTarget の内部状態
#[derive(Debug)]
pub struct FakeState {
    pid: i32,
    recorded: bool,
    breakpoints: BTreeMap<i64, Breakpoint>,
    next_breakpoint_id: i64,
    locations: HashMap<String, Vec<Location>>,
    position: Location,
    thread_id: i64,
    goroutines: Vec<Goroutine>,
    selected_goroutine: i64,
    values: HashMap<String, Variable>,
    locals: Vec<Variable>,
    args: Vec<Variable>,
    stack: Vec<Stackframe>,
    checkpoints: Vec<Checkpoint>,
    next_checkpoint_id: i64,
    scripts: VecDeque<Vec<FakeEvent>>,
    discarded_on_restart: Vec<DiscardedBreakpoint>,
    failing_clears: HashSet<i64>,
    calls: Vec<String>,
    exited: bool,
}

impl FakeState {
    fn new(recorded: bool) -> Self {
        let position = Location {
            pc: 0x1000,
            file: "main.go".to_string(),
            line: 1,
            function: Some(Function {
                name: "main.main".to_string(),
                optimized: false,
            }),
        };
        Self {
            pid: 4242,
            recorded,
            breakpoints: BTreeMap::new(),
            next_breakpoint_id: 1,
            locations: HashMap::new(),
            position: position.clone(),
            thread_id: 1,
            goroutines: vec![Goroutine {
                id: 1,
                current_loc: position.clone(),
                user_current_loc: position.clone(),
                go_statement_loc: position,
                thread_id: 1,
            }],
            selected_goroutine: 1,
            values: HashMap::new(),
            locals: Vec::new(),
            args: Vec::new(),
            stack: Vec::new(),
            checkpoints: Vec::new(),
            next_checkpoint_id: 1,
            scripts: VecDeque::new(),
            discarded_on_restart: Vec::new(),
            failing_clears: HashSet::new(),
            calls: Vec::new(),
            exited: false,
        }
    }

    /// 記録されたデバッグ操作の一覧
    pub fn calls(&self) -> &[String] {
        &self.calls
    }

    fn current_thread(&self) -> Thread {
        Thread {
            id: self.thread_id,
            pc: self.position.pc,
            file: self.position.file.clone(),
            line: self.position.line,
            function: self.position.function.clone(),
            goroutine_id: self.selected_goroutine,
            breakpoint: None,
            breakpoint_info: None,
        }
    }

    fn selected(&self) -> Option<Goroutine> {
        self.goroutines
            .iter()
            .find(|g| g.id == self.selected_goroutine)
            .cloned()
    }

    fn snapshot(&self) -> DebuggerState {
        let thread = self.current_thread();
        DebuggerState {
            pid: self.pid,
            running: false,
            current_thread: Some(thread.clone()),
            selected_goroutine: self.selected(),
            threads: vec![thread],
            next_in_progress: false,
            exited: self.exited,
            exit_status: 0,
            when: String::new(),
            err: None,
            error: None,
        }
    }

    fn move_to(&mut self, location: Location) {
        self.position = location.clone();
        if let Some(g) = self
            .goroutines
            .iter_mut()
            .find(|g| g.id == self.selected_goroutine)
        {
            g.current_loc = location.clone();
            g.user_current_loc = location;
        }
    }

    fn eval(&self, expr: &str) -> Option<Variable> {
        self.values.get(expr).cloned()
    }

    fn hit(&mut self, id: i64, goroutine: i64, next_in_progress: bool) -> DebuggerState {
        let Some(bp) = self.breakpoints.get_mut(&id) else {
            return DebuggerState {
                err: Some(format!("no breakpoint with id {}", id)),
                ..Default::default()
            };
        };
        bp.total_hit_count += 1;
        *bp.hit_count.entry(goroutine.to_string()).or_insert(0) += 1;
        let bp = bp.clone();

        self.selected_goroutine = goroutine;
        self.move_to(Location {
            pc: bp.addr,
            file: bp.file.clone(),
            line: bp.line,
            function: Some(Function {
                name: bp.function_name.clone(),
                optimized: false,
            }),
        });

        let info = BreakpointInfo {
            stacktrace: if bp.stacktrace > 0 {
                self.stack
                    .iter()
                    .take(bp.stacktrace as usize)
                    .cloned()
                    .collect()
            } else {
                Vec::new()
            },
            goroutine: if bp.goroutine { self.selected() } else { None },
            variables: bp
                .variables
                .iter()
                .map(|expr| {
                    self.eval(expr).unwrap_or_else(|| Variable {
                        name: expr.clone(),
                        value: "<unreadable>".to_string(),
                        ..Default::default()
                    })
                })
                .collect(),
            arguments: if bp.load_args.is_some() {
                self.args.clone()
            } else {
                Vec::new()
            },
            locals: if bp.load_locals.is_some() {
                self.locals.clone()
            } else {
                Vec::new()
            },
        };

        let mut state = self.snapshot();
        state.next_in_progress = next_in_progress;
        if let Some(thread) = state.current_thread.as_mut() {
            thread.goroutine_id = goroutine;
            thread.breakpoint = Some(bp);
            thread.breakpoint_info = Some(info);
        }
        state.threads = state.current_thread.iter().cloned().collect();
        state
    }

    fn run(&mut self, op: &str) -> StateStream {
        self.calls.push(op.to_string());
        if self.exited {
            return StateStream::from_states([DebuggerState {
                pid: self.pid,
                exited: true,
                ..Default::default()
            }]);
        }
        let events = self.scripts.pop_front().unwrap_or_else(|| {
            vec![FakeEvent::Stop {
                location: self.position.clone(),
                next_in_progress: false,
            }]
        });
        let mut states = Vec::with_capacity(events.len());
        for event in events {
            let state = match event {
                FakeEvent::Stop {
                    location,
                    next_in_progress,
                } => {
                    self.move_to(location);
                    let mut state = self.snapshot();
                    state.next_in_progress = next_in_progress;
                    state
                }
                FakeEvent::Hit {
                    breakpoint,
                    goroutine,
                    next_in_progress,
                } => self.hit(breakpoint, goroutine, next_in_progress),
                FakeEvent::Error(message) => DebuggerState {
                    err: Some(message),
                    ..Default::default()
                },
                FakeEvent::Exit(status) => {
                    self.exited = true;
                    DebuggerState {
                        pid: self.pid,
                        exited: true,
                        exit_status: status,
                        ..Default::default()
                    }
                }
            };
            states.push(state);
        }
        if self.recorded {
            for (i, state) in states.iter_mut().enumerate() {
                if state.err.is_none() && !state.exited {
                    state.when = format!("Current event: {}", self.calls.len() * 100 + i);
                }
            }
        }
        StateStream::from_states(states)
    }
}

/// スクリプト駆動のインメモリターゲット
#[derive(Debug, Clone)]
pub struct FakeTarget {
    state: Rc<RefCell<FakeState>>,
}

impl FakeTarget {
    /// 通常のライブプロセスとして振る舞うターゲット
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(FakeState::new(false))),
        }
    }

    /// 記録プロセス（逆実行・チェックポイント対応）として振る舞うターゲット
    pub fn recording() -> Self {
        Self {
            state: Rc::new(RefCell::new(FakeState::new(true))),
        }
    }

    /// 内部状態を参照する
    pub fn inspect(&self) -> Ref<'_, FakeState> {
        self.state.borrow()
    }

    /// 発行された操作の一覧
    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    /// 指定した操作が発行された回数
    pub fn count_calls(&self, op: &str) -> usize {
        self.state.borrow().calls.iter().filter(|c| *c == op).count()
    }

    /// ロケーション指定子の解決結果を登録する
    pub fn add_location(&self, locspec: &str, locations: Vec<Location>) {
        self.state
            .borrow_mut()
            .locations
            .insert(locspec.to_string(), locations);
    }

    /// 式の評価結果を登録する
    pub fn set_value(&self, expr: &str, value: &str) {
        self.state.borrow_mut().values.insert(
            expr.to_string(),
            Variable {
                name: expr.to_string(),
                value: value.to_string(),
                ..Default::default()
            },
        );
    }

    /// ローカル変数と引数を登録する
    pub fn set_frame_variables(&self, args: Vec<Variable>, locals: Vec<Variable>) {
        let mut state = self.state.borrow_mut();
        state.args = args;
        state.locals = locals;
    }

    /// スタックトレースを登録する
    pub fn set_stack(&self, stack: Vec<Stackframe>) {
        self.state.borrow_mut().stack = stack;
    }

    /// 次の実行制御1回分のイベント列を積む
    pub fn script(&self, events: Vec<FakeEvent>) {
        self.state.borrow_mut().scripts.push_back(events);
    }

    /// 現在位置を設定する
    pub fn set_position(&self, location: Location) {
        self.state.borrow_mut().move_to(location);
    }

    /// goroutineを追加する
    pub fn add_goroutine(&self, goroutine: Goroutine) {
        self.state.borrow_mut().goroutines.push(goroutine);
    }

    /// IDを指定してブレークポイントを直接登録する（内部ブレークポイント用）
    pub fn insert_breakpoint(&self, bp: Breakpoint) {
        let mut state = self.state.borrow_mut();
        if bp.id >= state.next_breakpoint_id {
            state.next_breakpoint_id = bp.id + 1;
        }
        state.breakpoints.insert(bp.id, bp);
    }

    /// 指定IDの削除を失敗させる
    pub fn fail_clear(&self, id: i64) {
        self.state.borrow_mut().failing_clears.insert(id);
    }

    /// 再起動時に破棄されるブレークポイントを設定する
    pub fn discard_on_restart(&self, discarded: Vec<DiscardedBreakpoint>) {
        self.state.borrow_mut().discarded_on_restart = discarded;
    }

    /// 現在のブレークポイント一覧（ID順）
    pub fn breakpoints(&self) -> Vec<Breakpoint> {
        self.state.borrow().breakpoints.values().cloned().collect()
    }

    /// 現在のチェックポイント一覧
    pub fn checkpoints(&self) -> Vec<Checkpoint> {
        self.state.borrow().checkpoints.clone()
    }
}

impl Default for FakeTarget {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found_by_id(id: i64) -> anyhow::Error {
    TargetError::BreakpointNotFound {
        reference: format!("id {}", id),
    }
    .into()
}

fn not_found_by_name(name: &str) -> anyhow::Error {
    TargetError::BreakpointNotFound {
        reference: format!("name {}", name),
    }
    .into()
}

impl TargetControl for FakeTarget {
    fn process_pid(&self) -> i32 {
        self.state.borrow().pid
    }

    fn last_modified(&self) -> Option<SystemTime> {
        None
    }

    fn recorded(&self) -> bool {
        self.state.borrow().recorded
    }

    fn detach(&mut self, kill: bool) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.calls.push(format!("detach kill={}", kill));
        Ok(())
    }

    fn restart_from(&mut self, pos: &str) -> Result<Vec<DiscardedBreakpoint>> {
        let mut state = self.state.borrow_mut();
        state.calls.push(format!("restart {}", pos));
        if let Some(id) = pos.strip_prefix('c').and_then(|s| s.parse::<i64>().ok()) {
            if !state.checkpoints.iter().any(|cp| cp.id == id) {
                return Err(TargetError::CheckpointNotFound { id }.into());
            }
        }
        state.exited = false;
        if !state.recorded {
            state.pid += 1;
        }
        let discarded = std::mem::take(&mut state.discarded_on_restart);
        for d in &discarded {
            state.breakpoints.remove(&d.breakpoint.id);
        }
        Ok(discarded)
    }

    fn get_state(&mut self) -> Result<DebuggerState> {
        Ok(self.state.borrow().snapshot())
    }

    fn continue_execution(&mut self) -> StateStream {
        self.state.borrow_mut().run("continue")
    }

    fn rewind(&mut self) -> StateStream {
        if !self.state.borrow().recorded {
            return StateStream::failed("rewind is not supported by this target");
        }
        self.state.borrow_mut().run("rewind")
    }

    fn step(&mut self) -> StateStream {
        self.state.borrow_mut().run("step")
    }

    fn step_instruction(&mut self) -> StateStream {
        self.state.borrow_mut().run("step-instruction")
    }

    fn next(&mut self) -> StateStream {
        self.state.borrow_mut().run("next")
    }

    fn step_out(&mut self) -> StateStream {
        self.state.borrow_mut().run("stepout")
    }

    fn switch_thread(&mut self, thread_id: i64) -> Result<DebuggerState> {
        let mut state = self.state.borrow_mut();
        state.calls.push(format!("switch-thread {}", thread_id));
        if thread_id != state.thread_id {
            return Err(TargetError::remote(format!("unknown thread {}", thread_id)).into());
        }
        Ok(state.snapshot())
    }

    fn switch_goroutine(&mut self, goroutine_id: i64) -> Result<DebuggerState> {
        let mut state = self.state.borrow_mut();
        state.calls.push(format!("switch-goroutine {}", goroutine_id));
        let Some(g) = state.goroutines.iter().find(|g| g.id == goroutine_id).cloned() else {
            return Err(TargetError::remote(format!("unknown goroutine {}", goroutine_id)).into());
        };
        state.selected_goroutine = g.id;
        state.position = g.current_loc.clone();
        if g.thread_id != 0 {
            state.thread_id = g.thread_id;
        }
        Ok(state.snapshot())
    }

    fn list_threads(&mut self) -> Result<Vec<Thread>> {
        Ok(vec![self.state.borrow().current_thread()])
    }

    fn list_goroutines(&mut self) -> Result<Vec<Goroutine>> {
        Ok(self.state.borrow().goroutines.clone())
    }

    fn create_breakpoint(&mut self, bp: &Breakpoint) -> Result<Breakpoint> {
        let mut state = self.state.borrow_mut();
        if let Some(existing) = state.breakpoints.values().find(|b| b.addr == bp.addr) {
            return Err(TargetError::remote(format!(
                "Breakpoint exists at {}:{} at {:#x}",
                existing.file, existing.line, existing.addr
            ))
            .into());
        }
        let location = state
            .locations
            .values()
            .flatten()
            .find(|loc| loc.pc == bp.addr)
            .cloned()
            .unwrap_or_default();
        let mut created = bp.clone();
        created.id = state.next_breakpoint_id;
        created.file = location.file.clone();
        created.line = location.line;
        created.function_name = location.function_name().unwrap_or_default().to_string();
        state.next_breakpoint_id += 1;
        state.breakpoints.insert(created.id, created.clone());
        Ok(created)
    }

    fn amend_breakpoint(&mut self, bp: &Breakpoint) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.calls.push(format!("amend {}", bp.id));
        let slot = state
            .breakpoints
            .get_mut(&bp.id)
            .ok_or_else(|| not_found_by_id(bp.id))?;
        *slot = bp.clone();
        Ok(())
    }

    fn clear_breakpoint(&mut self, id: i64) -> Result<Breakpoint> {
        let mut state = self.state.borrow_mut();
        if state.failing_clears.contains(&id) {
            return Err(TargetError::remote(format!("could not clear breakpoint {}", id)).into());
        }
        state.breakpoints.remove(&id).ok_or_else(|| not_found_by_id(id))
    }

    fn clear_breakpoint_by_name(&mut self, name: &str) -> Result<Breakpoint> {
        let mut state = self.state.borrow_mut();
        let id = state
            .breakpoints
            .values()
            .find(|b| b.name == name)
            .map(|b| b.id)
            .ok_or_else(|| not_found_by_name(name))?;
        state.breakpoints.remove(&id).ok_or_else(|| not_found_by_id(id))
    }

    fn list_breakpoints(&mut self) -> Result<Vec<Breakpoint>> {
        Ok(self.breakpoints())
    }

    fn get_breakpoint(&mut self, id: i64) -> Result<Breakpoint> {
        self.state
            .borrow()
            .breakpoints
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found_by_id(id))
    }

    fn get_breakpoint_by_name(&mut self, name: &str) -> Result<Breakpoint> {
        self.state
            .borrow()
            .breakpoints
            .values()
            .find(|b| b.name == name)
            .cloned()
            .ok_or_else(|| not_found_by_name(name))
    }

    fn find_location(&mut self, _scope: EvalScope, locspec: &str) -> Result<Vec<Location>> {
        let state = self.state.borrow();
        if locspec == "+0" {
            return Ok(vec![state.position.clone()]);
        }
        state.locations.get(locspec).cloned().ok_or_else(|| {
            TargetError::LocationNotFound {
                locspec: locspec.to_string(),
            }
            .into()
        })
    }

    fn checkpoint(&mut self, where_: &str) -> Result<i64> {
        let mut state = self.state.borrow_mut();
        if !state.recorded {
            return Err(TargetError::Unsupported {
                operation: "checkpoint".to_string(),
            }
            .into());
        }
        let id = state.next_checkpoint_id;
        state.next_checkpoint_id += 1;
        let when = format!("{}", state.calls.len());
        state.checkpoints.push(Checkpoint {
            id,
            when,
            where_: where_.to_string(),
        });
        Ok(id)
    }

    fn list_checkpoints(&mut self) -> Result<Vec<Checkpoint>> {
        Ok(self.checkpoints())
    }

    fn clear_checkpoint(&mut self, id: i64) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let before = state.checkpoints.len();
        state.checkpoints.retain(|cp| cp.id != id);
        if state.checkpoints.len() == before {
            return Err(TargetError::CheckpointNotFound { id }.into());
        }
        Ok(())
    }

    fn eval_variable(
        &mut self,
        _scope: EvalScope,
        expr: &str,
        _cfg: LoadConfig,
    ) -> Result<Variable> {
        let mut state = self.state.borrow_mut();
        state.calls.push(format!("eval {}", expr));
        state.eval(expr).ok_or_else(|| {
            TargetError::remote(format!("could not find symbol value for {}", expr)).into()
        })
    }

    fn set_variable(&mut self, _scope: EvalScope, symbol: &str, value: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let slot = state.values.get_mut(symbol).ok_or_else(|| {
            anyhow::Error::new(TargetError::remote(format!(
                "could not find symbol value for {}",
                symbol
            )))
        })?;
        slot.value = value.to_string();
        Ok(())
    }

    fn list_function_args(&mut self, _scope: EvalScope, _cfg: LoadConfig) -> Result<Vec<Variable>> {
        Ok(self.state.borrow().args.clone())
    }

    fn list_local_variables(
        &mut self,
        _scope: EvalScope,
        _cfg: LoadConfig,
    ) -> Result<Vec<Variable>> {
        Ok(self.state.borrow().locals.clone())
    }

    fn list_package_variables(&mut self, _filter: &str, _cfg: LoadConfig) -> Result<Vec<Variable>> {
        let state = self.state.borrow();
        let mut vars: Vec<Variable> = state.values.values().cloned().collect();
        vars.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(vars)
    }

    fn stacktrace(
        &mut self,
        _goroutine_id: i64,
        depth: i64,
        _cfg: Option<LoadConfig>,
    ) -> Result<Vec<Stackframe>> {
        let state = self.state.borrow();
        let depth = usize::try_from(depth).unwrap_or(0) + 1;
        Ok(state.stack.iter().take(depth).cloned().collect())
    }

    fn list_registers(&mut self, _thread_id: i64, include_fp: bool) -> Result<String> {
        let pc = self.state.borrow().position.pc;
        let mut regs = format!("Rip = {:#018x}\n", pc);
        if include_fp {
            regs.push_str("XMM0 = 0x0\n");
        }
        Ok(regs)
    }

    fn list_sources(&mut self, _filter: &str) -> Result<Vec<String>> {
        let state = self.state.borrow();
        let mut files: Vec<String> = state
            .locations
            .values()
            .flatten()
            .map(|l| l.file.clone())
            .collect();
        files.sort();
        files.dedup();
        Ok(files)
    }

    fn list_functions(&mut self, _filter: &str) -> Result<Vec<String>> {
        let state = self.state.borrow();
        let mut funcs: Vec<String> = state
            .locations
            .values()
            .flatten()
            .filter_map(|l| l.function_name().map(str::to_string))
            .collect();
        funcs.sort();
        funcs.dedup();
        Ok(funcs)
    }

    fn list_types(&mut self, _filter: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn disassemble_pc(
        &mut self,
        _scope: EvalScope,
        pc: u64,
        _flavour: AsmFlavour,
    ) -> Result<Vec<AsmInstruction>> {
        Ok(vec![AsmInstruction {
            loc: Location {
                pc,
                ..self.state.borrow().position.clone()
            },
            bytes: vec![0x90],
            text: "nop".to_string(),
            at_pc: true,
            breakpoint: false,
        }])
    }

    fn disassemble_range(
        &mut self,
        _scope: EvalScope,
        start: u64,
        end: u64,
        _flavour: AsmFlavour,
    ) -> Result<Vec<AsmInstruction>> {
        let position = self.state.borrow().position.clone();
        Ok((start..end)
            .map(|pc| AsmInstruction {
                loc: Location {
                    pc,
                    ..position.clone()
                },
                bytes: vec![0x90],
                text: "nop".to_string(),
                at_pc: pc == position.pc,
                breakpoint: false,
            })
            .collect())
    }
}
