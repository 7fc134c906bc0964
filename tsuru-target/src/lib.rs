//! tsuru ターゲット制御サービス
//!
//! このクレートは、デバッグ対象プロセスを操作するための抽象インターフェースを提供します。
//! コマンド層とやり取りするデータ型、状態ストリーム、エラー型、
//! そしてヘッドレスバックエンドへ接続するRPCクライアントを含みます。

pub mod api;
pub mod error;
pub mod rpc;
pub mod service;
pub mod stream;

#[cfg(feature = "fake")]
pub mod fake;

pub use api::{
    valid_breakpoint_name, AsmFlavour, AsmInstruction, Breakpoint, BreakpointInfo, Checkpoint,
    DebuggerState, DiscardedBreakpoint, EvalScope, Function, Goroutine, LoadConfig, Location,
    Stackframe, Thread, Variable, LONG_LOAD_CONFIG, SHORT_LOAD_CONFIG,
};
pub use error::{is_connection_closed, is_process_exited, TargetError};
pub use rpc::RpcClient;
pub use service::TargetControl;
pub use stream::{StateSender, StateStream};

/// ターゲット制御の結果型
pub type Result<T> = anyhow::Result<T>;
