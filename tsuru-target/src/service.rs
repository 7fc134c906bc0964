//! ターゲット制御サービス
//!
//! コマンド層はこのトレイトを通してのみデバッグ対象を操作します。
//! プロセス制御・シンボル解決・変数評価・逆アセンブルはすべて実装側の責務です。

use crate::api::{
    AsmFlavour, AsmInstruction, Breakpoint, Checkpoint, DebuggerState, DiscardedBreakpoint,
    EvalScope, Goroutine, LoadConfig, Location, Stackframe, Thread, Variable,
};
use crate::{Result, StateStream};
use std::time::SystemTime;

/// ターゲット制御サービス
pub trait TargetControl {
    /// デバッグ対象のプロセスID
    fn process_pid(&self) -> i32;

    /// 実行ファイルの最終更新時刻（ソース表示の鮮度チェック用）
    fn last_modified(&self) -> Option<SystemTime>;

    /// 記録されたプロセス（逆実行可能）かどうか
    fn recorded(&self) -> bool;

    /// デタッチする（`kill` なら対象プロセスを終了させる）
    fn detach(&mut self, kill: bool) -> Result<()>;

    /// 再起動する
    ///
    /// `pos` はイベント番号またはチェックポイントID（空なら先頭から）。
    /// 再設定できなかったブレークポイントを返します。
    fn restart_from(&mut self, pos: &str) -> Result<Vec<DiscardedBreakpoint>>;

    /// 現在の状態を取得する
    fn get_state(&mut self) -> Result<DebuggerState>;

    // ---- 実行制御（いずれも状態ストリームを返す） ----

    fn continue_execution(&mut self) -> StateStream;
    fn rewind(&mut self) -> StateStream;
    fn step(&mut self) -> StateStream;
    fn step_instruction(&mut self) -> StateStream;
    fn next(&mut self) -> StateStream;
    fn step_out(&mut self) -> StateStream;

    // ---- スレッド / goroutine ----

    fn switch_thread(&mut self, thread_id: i64) -> Result<DebuggerState>;
    fn switch_goroutine(&mut self, goroutine_id: i64) -> Result<DebuggerState>;
    fn list_threads(&mut self) -> Result<Vec<Thread>>;
    fn list_goroutines(&mut self) -> Result<Vec<Goroutine>>;

    // ---- ブレークポイント ----

    fn create_breakpoint(&mut self, bp: &Breakpoint) -> Result<Breakpoint>;
    fn amend_breakpoint(&mut self, bp: &Breakpoint) -> Result<()>;
    fn clear_breakpoint(&mut self, id: i64) -> Result<Breakpoint>;
    fn clear_breakpoint_by_name(&mut self, name: &str) -> Result<Breakpoint>;
    fn list_breakpoints(&mut self) -> Result<Vec<Breakpoint>>;
    fn get_breakpoint(&mut self, id: i64) -> Result<Breakpoint>;
    fn get_breakpoint_by_name(&mut self, name: &str) -> Result<Breakpoint>;

    /// ロケーション指定子をアドレスの集合に解決する
    fn find_location(&mut self, scope: EvalScope, locspec: &str) -> Result<Vec<Location>>;

    // ---- チェックポイント ----

    fn checkpoint(&mut self, where_: &str) -> Result<i64>;
    fn list_checkpoints(&mut self) -> Result<Vec<Checkpoint>>;
    fn clear_checkpoint(&mut self, id: i64) -> Result<()>;

    // ---- 変数・スタック ----

    fn eval_variable(&mut self, scope: EvalScope, expr: &str, cfg: LoadConfig)
        -> Result<Variable>;
    fn set_variable(&mut self, scope: EvalScope, symbol: &str, value: &str) -> Result<()>;
    fn list_function_args(&mut self, scope: EvalScope, cfg: LoadConfig) -> Result<Vec<Variable>>;
    fn list_local_variables(&mut self, scope: EvalScope, cfg: LoadConfig)
        -> Result<Vec<Variable>>;
    fn list_package_variables(&mut self, filter: &str, cfg: LoadConfig) -> Result<Vec<Variable>>;
    fn stacktrace(
        &mut self,
        goroutine_id: i64,
        depth: i64,
        cfg: Option<LoadConfig>,
    ) -> Result<Vec<Stackframe>>;
    fn list_registers(&mut self, thread_id: i64, include_fp: bool) -> Result<String>;

    // ---- シンボル ----

    fn list_sources(&mut self, filter: &str) -> Result<Vec<String>>;
    fn list_functions(&mut self, filter: &str) -> Result<Vec<String>>;
    fn list_types(&mut self, filter: &str) -> Result<Vec<String>>;

    // ---- 逆アセンブル ----

    fn disassemble_pc(
        &mut self,
        scope: EvalScope,
        pc: u64,
        flavour: AsmFlavour,
    ) -> Result<Vec<AsmInstruction>>;
    fn disassemble_range(
        &mut self,
        scope: EvalScope,
        start: u64,
        end: u64,
        flavour: AsmFlavour,
    ) -> Result<Vec<AsmInstruction>>;
}
