//! エラー型とエラーメッセージ定数

use thiserror::Error;

/// 引数が足りない場合のエラーメッセージ
pub const ERR_NOT_ENOUGH_ARGUMENTS: &str = "not enough arguments";

/// フレーム指定付きで実行制御を行おうとした場合のエラーメッセージ
pub const ERR_FRAME_PREFIX: &str = "frame prefix not accepted";

/// 状態ストリームが空だった場合のエラーメッセージ
pub const ERR_EMPTY_STREAM: &str = "target returned no state";

/// 現在のスレッドが無い場合のエラーメッセージ
pub const ERR_NO_CURRENT_THREAD: &str = "no current thread";

/// clear-checkpoint の引数が不正な場合のエラーメッセージ
pub const ERR_CHECKPOINT_ID: &str = "clear-checkpoint argument must be a checkpoint ID";

/// コマンド層のエラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// 該当するコマンドが無い（またはプレフィックスが許可されていない）
    #[error("command not available")]
    NotAvailable,

    /// 引数の誤り
    #[error("{0}")]
    Usage(String),

    /// ブレークポイント参照として解釈できない
    #[error("invalid breakpoint reference '{0}'")]
    InvalidBreakpointRef(String),
}

impl CommandError {
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }
}

/// 終了要求
///
/// エラーではなく、セッションを終了させるための制御信号です。
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("exit requested")]
pub struct ExitRequest;

/// エラーが終了要求か
pub fn is_exit_request(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ExitRequest>().is_some()
}

/// エラーが「コマンドが無い」か
pub fn is_command_not_available(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<CommandError>(),
        Some(CommandError::NotAvailable)
    )
}
