//! デバッグセッション
//!
//! コマンドレジストリ・ターゲット・設定・出力先を束ね、
//! 1行ずつコマンドをディスパッチします。

use crate::command::{CommandFn, Commands};
use crate::config::Config;
use crate::context::CallContext;
use crate::errors::is_exit_request;
use crate::format;
use crate::parse::split_command;
use crate::Result;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use tsuru_target::{DebuggerState, LoadConfig, TargetControl};

/// デバッグセッション
pub struct Session {
    pub(crate) commands: Commands,
    pub(crate) client: Box<dyn TargetControl>,
    pub(crate) config: Config,
    pub(crate) config_path: Option<PathBuf>,
    pub(crate) out: Box<dyn Write>,
}

impl Session {
    /// セッションを作成する
    ///
    /// ターゲットが記録プロセスかどうかでコマンド一覧が変わります。
    pub fn new(client: Box<dyn TargetControl>, config: Config, out: Box<dyn Write>) -> Self {
        let mut commands = Commands::new(client.recorded());
        commands.merge(&config.aliases);
        Self {
            commands,
            client,
            config,
            config_path: None,
            out,
        }
    }

    /// `config -save` の保存先を指定する
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// 1行のコマンドを実行する
    pub fn call(&mut self, line: &str) -> Result<()> {
        self.call_with_context(line, &mut CallContext::new())
    }

    /// コンテキスト付きでコマンドを実行する（プレフィックスからの再帰呼び出し用）
    pub fn call_with_context(&mut self, line: &str, ctx: &mut CallContext) -> Result<()> {
        let (name, args) = split_command(line);
        let handler = self.commands.find(name, ctx.prefix);
        debug!(command = name, prefix = ?ctx.prefix, "dispatch");
        handler(self, ctx, args)
    }

    /// コマンドファイルを実行する
    ///
    /// 空行と `#` で始まる行は読み飛ばします。失敗した行は報告して続行しますが、
    /// 終了要求は呼び出し元に返します。
    pub fn execute_file(&mut self, path: &Path) -> Result<()> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut buf = Vec::new();
        let mut lineno = 0;
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            lineno += 1;
            // 不正なUTF-8はその行だけ置換文字にする
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Err(e) = self.call(line) {
                if is_exit_request(&e) {
                    return Err(e);
                }
                writeln!(self.out, "{}:{}: {}", path.display(), lineno, e)?;
            }
        }
        Ok(())
    }

    /// ハンドラーを登録する
    pub fn register(&mut self, name: &str, handler: CommandFn, help: &str) {
        self.commands.register(name, handler, help);
    }

    pub fn commands(&self) -> &Commands {
        &self.commands
    }

    pub fn client(&mut self) -> &mut dyn TargetControl {
        self.client.as_mut()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn out(&mut self) -> &mut dyn Write {
        self.out.as_mut()
    }

    /// 詳細表示用の読み込み設定
    pub(crate) fn load_config(&self) -> LoadConfig {
        self.config.long_load_config()
    }

    /// 停止位置のコンテキストを表示する
    pub(crate) fn print_context(&mut self, state: &DebuggerState) -> Result<()> {
        format::print_context(self.out.as_mut(), state)?;
        Ok(())
    }

    /// ソースファイルの該当行の前後を表示する
    pub(crate) fn print_file(&mut self, path: &str, line: u32, show_arrow: bool) -> Result<()> {
        let path = self.config.substitute_path(path);
        let stale_since = self.client.last_modified();
        format::print_source(self.out.as_mut(), Path::new(&path), line, show_arrow, stale_since)?;
        Ok(())
    }

    /// 状態の現在位置のソースを表示する（失敗は無視する）
    pub(crate) fn print_stop_file(&mut self, state: &DebuggerState) {
        if let Some(th) = state.current_thread.as_ref() {
            if let Err(e) = self.print_file(&th.file, th.line, true) {
                debug!(file = %th.file, "could not show source: {}", e);
            }
        }
    }

    /// 状態を取り直して現在位置のソースを表示する（失敗は無視する）
    pub(crate) fn print_file_no_state(&mut self) {
        match self.client.get_state() {
            Ok(state) => self.print_stop_file(&state),
            Err(e) => debug!("could not get state: {}", e),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("commands", &self.commands)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
