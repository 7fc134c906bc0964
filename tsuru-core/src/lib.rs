//! tsuru デバッガのコマンド層
//!
//! このクレートは、ユーザーが入力したコマンド行を解釈し、
//! ターゲット制御サービスに対する操作へ変換します。
//! コマンドレジストリ、スコーププレフィックス、実行制御、
//! ブレークポイント・チェックポイント管理、表示処理を含みます。

pub mod breakpoints;
pub mod checkpoints;
pub mod command;
pub mod config;
pub mod context;
pub mod errors;
mod execution;
pub mod format;
mod inspect;
pub mod parse;
pub mod session;
mod threads;

pub use breakpoints::resolve_breakpoint;
pub use checkpoints::checkpoint_label;
pub use command::{Command, CommandFn, Commands, Prefixes};
pub use config::{Config, SubstitutePathRule};
pub use context::{CallContext, Prefix};
pub use errors::{is_command_not_available, is_exit_request, CommandError, ExitRequest};
pub use session::Session;

// 他のクレートから使用するために再エクスポート
pub use tsuru_target::{is_connection_closed, is_process_exited, TargetControl, TargetError};

/// コマンド層の結果型
pub type Result<T> = anyhow::Result<T>;
