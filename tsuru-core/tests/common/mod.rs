//! 統合テスト共通のヘルパー
#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Write};
use std::path::PathBuf;
use std::rc::Rc;
use tsuru_core::{Config, Session};
use tsuru_target::fake::FakeTarget;
use tsuru_target::{Function, Location};

/// セッションの出力を取り出せる共有バッファ
#[derive(Clone, Default)]
pub struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    /// これまでの出力を取り出して空にする
    pub fn take(&self) -> String {
        String::from_utf8(std::mem::take(&mut *self.0.borrow_mut())).unwrap()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn session(target: &FakeTarget) -> (Session, SharedBuf) {
    session_with_config(target, Config::default())
}

pub fn session_with_config(target: &FakeTarget, config: Config) -> (Session, SharedBuf) {
    let out = SharedBuf::default();
    let s = Session::new(Box::new(target.clone()), config, Box::new(out.clone()));
    (s, out)
}

pub fn loc(pc: u64, file: &str, line: u32, function: &str) -> Location {
    Location {
        pc,
        file: file.to_string(),
        line,
        function: Some(Function {
            name: function.to_string(),
            optimized: false,
        }),
    }
}

/// `line N` を `lines` 行並べた一時ソースファイルを作る
pub fn write_source(name: &str, lines: u32) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("tsuru-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let text: String = (1..=lines).map(|i| format!("line {}\n", i)).collect();
    std::fs::write(&path, text).unwrap();
    path
}

/// 一時ファイルにコマンドを書き出す
pub fn write_script(name: &str, text: impl AsRef<[u8]>) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("tsuru-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}
