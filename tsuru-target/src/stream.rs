//! 状態ストリーム
//!
//! continue / step などの実行制御は、停止するたびにデバッガ状態を1つ送り出します。
//! 受け取り側は次の状態が届くまでブロックし、送信側が閉じるまで読み続けます。

use crate::api::DebuggerState;
use crate::error::TargetError;
use std::sync::mpsc::{self, Receiver, Sender};

/// 状態ストリームの送信側
#[derive(Debug, Clone)]
pub struct StateSender {
    tx: Sender<DebuggerState>,
}

impl StateSender {
    /// 状態を送る
    ///
    /// 受信側がすでに破棄されていれば `false` を返します。
    pub fn send(&self, state: DebuggerState) -> bool {
        self.tx.send(state).is_ok()
    }
}

/// 順序付き・有限・再開不可の状態列
#[derive(Debug)]
pub struct StateStream {
    rx: Receiver<DebuggerState>,
}

impl StateStream {
    /// 送信側と受信側の組を作成する
    pub fn channel() -> (StateSender, StateStream) {
        let (tx, rx) = mpsc::channel();
        (StateSender { tx }, StateStream { rx })
    }

    /// 既に分かっている状態列からストリームを作成する
    pub fn from_states(states: impl IntoIterator<Item = DebuggerState>) -> Self {
        let (tx, stream) = Self::channel();
        for state in states {
            tx.send(state);
        }
        stream
    }

    /// エラー1つだけのストリームを作成する
    pub fn failed(message: impl Into<String>) -> Self {
        Self::from_states([DebuggerState {
            err: Some(message.into()),
            ..Default::default()
        }])
    }

    /// 種類付きのエラー1つだけのストリームを作成する
    pub fn failed_with(error: TargetError) -> Self {
        Self::from_states([DebuggerState::from_error(error)])
    }
}

impl Iterator for StateStream {
    type Item = DebuggerState;

    fn next(&mut self) -> Option<DebuggerState> {
        self.rx.recv().ok()
    }
}
