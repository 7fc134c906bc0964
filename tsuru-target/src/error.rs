//! ターゲット制御のエラー型

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// ターゲット制御サービスが返すエラー
///
/// `anyhow::Error` から `downcast_ref` で取り出して種類を判定します。
/// RPC でもこの形のままやり取りします。
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetError {
    /// デバッグ対象プロセスが終了した
    #[error("Process {pid} has exited with status {status}")]
    ProcessExited { pid: i32, status: i32 },

    #[error("no breakpoint with {reference}")]
    BreakpointNotFound { reference: String },

    #[error("location \"{locspec}\" not found")]
    LocationNotFound { locspec: String },

    #[error("checkpoint c{id} not found")]
    CheckpointNotFound { id: i64 },

    #[error("{operation} is not supported by this target")]
    Unsupported { operation: String },

    /// バックエンドとの接続が切れた
    #[error("connection to target closed")]
    ConnectionClosed,

    /// バックエンド側で発生したその他のエラー
    #[error("{message}")]
    Remote { message: String },
}

impl TargetError {
    /// その他のエラーを作成する
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }
}

/// エラーがプロセス終了を表すか
pub fn is_process_exited(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<TargetError>(),
        Some(TargetError::ProcessExited { .. })
    )
}

/// エラーがバックエンドとの切断を表すか
pub fn is_connection_closed(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<TargetError>(),
        Some(TargetError::ConnectionClosed)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_exited_detection() {
        let err = anyhow::Error::new(TargetError::ProcessExited { pid: 10, status: 0 });
        assert!(is_process_exited(&err));
        assert_eq!(err.to_string(), "Process 10 has exited with status 0");

        let other = anyhow::Error::new(TargetError::remote("boom"));
        assert!(!is_process_exited(&other));
    }

    #[test]
    fn test_connection_closed_detection() {
        let err = anyhow::Error::new(TargetError::ConnectionClosed);
        assert!(is_connection_closed(&err));
        assert!(!is_process_exited(&err));
        assert_eq!(err.to_string(), "connection to target closed");

        let wire: TargetError = serde_json::from_str(r#"{"kind":"connection_closed"}"#).unwrap();
        assert_eq!(wire, TargetError::ConnectionClosed);
    }

    #[test]
    fn test_wire_format() {
        let err: TargetError =
            serde_json::from_str(r#"{"kind":"breakpoint_not_found","reference":"id 3"}"#).unwrap();
        assert_eq!(
            err,
            TargetError::BreakpointNotFound {
                reference: "id 3".to_string()
            }
        );
    }
}
