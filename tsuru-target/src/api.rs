//! ターゲット制御サービスとやり取りするデータ型
//!
//! スレッド、goroutine、ブレークポイント、チェックポイント、デバッガ状態など、
//! コマンド層がバックエンドから受け取る値をまとめて定義します。

use crate::error::TargetError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 関数情報
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Function {
    pub name: String,
    /// 最適化されてコンパイルされた関数かどうか
    pub optimized: bool,
}

/// ソース上の位置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    pub pc: u64,
    pub file: String,
    pub line: u32,
    pub function: Option<Function>,
}

impl Location {
    /// 関数名を取得する（不明なら `None`）
    pub fn function_name(&self) -> Option<&str> {
        self.function.as_ref().map(|f| f.name.as_str())
    }
}

/// 変数の読み込み設定
///
/// 値をどこまで辿って読み込むかを指定します。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadConfig {
    pub follow_pointers: bool,
    pub max_variable_recurse: i32,
    pub max_string_len: i32,
    pub max_array_values: i32,
    pub max_struct_fields: i32,
}

/// 詳細表示用の読み込み設定（`-v`）
pub const LONG_LOAD_CONFIG: LoadConfig = LoadConfig {
    follow_pointers: true,
    max_variable_recurse: 1,
    max_string_len: 64,
    max_array_values: 64,
    max_struct_fields: -1,
};

/// 一行表示用の読み込み設定
pub const SHORT_LOAD_CONFIG: LoadConfig = LoadConfig {
    follow_pointers: false,
    max_variable_recurse: 0,
    max_string_len: 64,
    max_array_values: 0,
    max_struct_fields: 3,
};

impl LoadConfig {
    /// 詳細表示の設定か
    ///
    /// 一行表示の設定以外はすべて詳細表示として扱います。
    /// 文字列長などの上限を変えた詳細設定もこちらに含まれます。
    pub fn is_long(&self) -> bool {
        *self != SHORT_LOAD_CONFIG
    }
}

/// 評価スコープ
///
/// `goroutine_id` が -1 の場合は現在選択中のgoroutineを表します。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalScope {
    pub goroutine_id: i64,
    pub frame: i64,
}

impl EvalScope {
    /// 現在のgoroutineの先頭フレーム
    pub const fn current() -> Self {
        Self {
            goroutine_id: -1,
            frame: 0,
        }
    }
}

impl Default for EvalScope {
    fn default() -> Self {
        Self::current()
    }
}

/// 評価済みの変数
///
/// 値の整形はバックエンドが行い、ここでは文字列として保持します。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Variable {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub real_type: String,
    /// 値の種類（"int", "struct", "interface" など）
    pub kind: String,
    pub value: String,
    pub children: Vec<Variable>,
    /// 内側のスコープで隠された変数かどうか
    pub shadowed: bool,
    pub location_expr: String,
}

impl Variable {
    /// 一行形式の文字列
    pub fn single_line(&self) -> String {
        if self.children.is_empty() {
            return self.value.clone();
        }
        let children: Vec<String> = self
            .children
            .iter()
            .map(|c| {
                if c.name.is_empty() {
                    c.single_line()
                } else {
                    format!("{}: {}", c.name, c.single_line())
                }
            })
            .collect();
        format!("{} {{{}}}", self.type_name, children.join(", "))
    }

    /// 複数行形式の文字列（子要素を `indent` 付きで改行表示）
    pub fn multi_line(&self, indent: &str) -> String {
        if self.children.is_empty() {
            return self.value.clone();
        }
        let inner = format!("{}\t", indent);
        let mut out = format!("{} {{\n", self.type_name);
        for c in &self.children {
            if c.name.is_empty() {
                out.push_str(&format!("{}{},\n", inner, c.multi_line(&inner)));
            } else {
                out.push_str(&format!("{}{}: {},\n", inner, c.name, c.multi_line(&inner)));
            }
        }
        out.push_str(indent);
        out.push('}');
        out
    }
}

/// スタックフレーム
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stackframe {
    pub location: Location,
    pub locals: Vec<Variable>,
    pub arguments: Vec<Variable>,
    pub frame_offset: i64,
    pub frame_pointer_offset: i64,
    /// フレームの読み取りに失敗した場合のエラー
    pub err: String,
}

/// goroutine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Goroutine {
    pub id: i64,
    /// ランタイム内部を含む現在位置
    pub current_loc: Location,
    /// ユーザーコード上の現在位置
    pub user_current_loc: Location,
    /// goroutineを生成した文の位置
    pub go_statement_loc: Location,
    /// 実行中のスレッドID（0なら停止中）
    pub thread_id: i64,
}

/// ブレークポイント（トレースポイントを含む）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Breakpoint {
    /// システムが割り当てるID（負の値は内部用）
    pub id: i64,
    pub name: String,
    pub addr: u64,
    pub file: String,
    pub line: u32,
    pub function_name: String,
    /// 条件式（空なら無条件）
    pub cond: String,
    /// 停止せずに通知だけ行うか
    pub tracepoint: bool,
    /// ヒット時にgoroutine情報を取得するか
    pub goroutine: bool,
    /// ヒット時に取得するスタックの深さ
    pub stacktrace: i64,
    /// ヒット時に評価する式
    pub variables: Vec<String>,
    pub load_args: Option<LoadConfig>,
    pub load_locals: Option<LoadConfig>,
    /// goroutine ID（文字列）ごとのヒット回数
    pub hit_count: BTreeMap<String, u64>,
    pub total_hit_count: u64,
}

/// ブレークポイントヒット時に取得された情報
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakpointInfo {
    pub stacktrace: Vec<Stackframe>,
    pub goroutine: Option<Goroutine>,
    pub variables: Vec<Variable>,
    pub arguments: Vec<Variable>,
    pub locals: Vec<Variable>,
}

/// スレッド
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thread {
    pub id: i64,
    pub pc: u64,
    pub file: String,
    pub line: u32,
    pub function: Option<Function>,
    pub goroutine_id: i64,
    /// 停止原因となったブレークポイント
    pub breakpoint: Option<Breakpoint>,
    pub breakpoint_info: Option<BreakpointInfo>,
}

/// デバッガ状態
///
/// 実行制御操作が返すストリームの1要素です。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebuggerState {
    pub pid: i32,
    pub running: bool,
    pub current_thread: Option<Thread>,
    pub selected_goroutine: Option<Goroutine>,
    pub threads: Vec<Thread>,
    /// 要求された step/next/stepout がまだ完了していないか
    pub next_in_progress: bool,
    pub exited: bool,
    pub exit_status: i32,
    /// 記録再生時の時刻ラベル
    pub when: String,
    /// エラー（このストリームはここで終わる）
    pub err: Option<String>,
    /// `err` の種類（分かっている場合）
    pub error: Option<TargetError>,
}

impl DebuggerState {
    /// 種類付きのエラー状態を作成する
    ///
    /// プロセス終了なら終了状態としても印を付けます。
    pub fn from_error(error: TargetError) -> Self {
        let mut state = Self {
            err: Some(error.to_string()),
            ..Default::default()
        };
        if let TargetError::ProcessExited { pid, status } = error {
            state.pid = pid;
            state.exited = true;
            state.exit_status = status;
        }
        state.error = Some(error);
        state
    }
}

/// チェックポイント
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Checkpoint {
    pub id: i64,
    pub when: String,
    #[serde(rename = "where")]
    pub where_: String,
}

/// 再起動で破棄されたブレークポイント
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscardedBreakpoint {
    pub breakpoint: Breakpoint,
    pub reason: String,
}

/// 逆アセンブル結果の1命令
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsmInstruction {
    pub loc: Location,
    pub bytes: Vec<u8>,
    pub text: String,
    /// 現在のPCを指しているか
    pub at_pc: bool,
    pub breakpoint: bool,
}

/// 逆アセンブル構文
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AsmFlavour {
    #[default]
    Intel,
    Gnu,
}

/// 名前がブレークポイント名として有効か検証する
///
/// 整数として解釈できる名前はIDと区別できないため拒否します。
pub fn valid_breakpoint_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("breakpoint name can not be empty".to_string());
    }
    if name.parse::<i64>().is_ok() {
        return Err("breakpoint name can not be a number".to_string());
    }
    if let Some(ch) = name.chars().find(|c| !(c.is_alphanumeric() || *c == '_')) {
        return Err(format!("invalid character in breakpoint name '{}'", ch));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_detail_level() {
        assert!(!SHORT_LOAD_CONFIG.is_long());
        assert!(LONG_LOAD_CONFIG.is_long());
        let custom = LoadConfig {
            max_string_len: 100,
            ..LONG_LOAD_CONFIG
        };
        assert!(custom.is_long());
    }

    #[test]
    fn test_valid_breakpoint_name() {
        assert!(valid_breakpoint_name("bp1").is_ok());
        assert!(valid_breakpoint_name("worker_entry").is_ok());
        assert!(valid_breakpoint_name("42").is_err());
        assert!(valid_breakpoint_name("-3").is_err());
        assert!(valid_breakpoint_name("main.go:10").is_err());
        assert!(valid_breakpoint_name("").is_err());
    }

    #[test]
    fn test_variable_single_line() {
        let v = Variable {
            name: "p".to_string(),
            type_name: "main.Point".to_string(),
            children: vec![
                Variable {
                    name: "X".to_string(),
                    value: "1".to_string(),
                    ..Default::default()
                },
                Variable {
                    name: "Y".to_string(),
                    value: "2".to_string(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(v.single_line(), "main.Point {X: 1, Y: 2}");
        assert_eq!(v.multi_line(""), "main.Point {\n\tX: 1,\n\tY: 2,\n}");
    }

    #[test]
    fn test_state_deserialize_defaults() {
        let state: DebuggerState = serde_json::from_str(r#"{"pid": 7}"#).unwrap();
        assert_eq!(state.pid, 7);
        assert!(state.current_thread.is_none());
        assert!(!state.next_in_progress);
    }
}
