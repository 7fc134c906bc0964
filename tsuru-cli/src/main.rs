//! tsuru CLI - コマンドラインインターフェース
//!
//! ヘッドレスバックエンドに接続して、対話的にデバッグコマンドを実行するREPL

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use tsuru_core::{is_connection_closed, is_exit_request, is_process_exited, Config, Session};
use tsuru_target::RpcClient;

/// tsuru - command-line debugger frontend
#[derive(Parser)]
#[command(name = "tsuru")]
#[command(version)]
#[command(about = "Command-line frontend for a headless debugger backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: FrontendCommand,
}

#[derive(Subcommand)]
enum FrontendCommand {
    /// Connect to a running headless backend
    Connect {
        /// Address of the backend (host:port)
        addr: String,

        /// File of commands executed before the first prompt
        #[arg(long)]
        init: Option<PathBuf>,

        /// Configuration file (default: ~/.config/tsuru/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Log filter (overrides RUST_LOG)
        #[arg(long)]
        log: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        FrontendCommand::Connect {
            addr,
            init,
            config,
            log,
        } => {
            init_logging(log.as_deref());
            let mut session = init_session(&addr, config)?;
            if let Some(path) = init {
                if !run_init_file(&mut session, &path) {
                    return session.client().detach(true);
                }
            }
            run_repl(&mut session)
        }
    }
}

/// ログ出力を初期化する（出力先は標準エラー）
fn init_logging(filter: Option<&str>) {
    let filter = match filter {
        Some(f) => EnvFilter::new(f),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// 設定を読み込み、バックエンドに接続してセッションを作る
fn init_session(addr: &str, config_path: Option<PathBuf>) -> Result<Session> {
    let config_path = config_path.or_else(Config::default_path);
    let config = match config_path.as_deref() {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let client = RpcClient::connect(addr).with_context(|| format!("could not connect to {}", addr))?;
    debug!(addr, "connected");

    let session = Session::new(Box::new(client), config, Box::new(std::io::stdout()));
    Ok(match config_path {
        Some(path) => session.with_config_path(path),
        None => session,
    })
}

/// 初期化ファイルのコマンドを実行する
///
/// ファイル内で終了が要求されたら偽を返します。
fn run_init_file(session: &mut Session, path: &Path) -> bool {
    match session.execute_file(path) {
        Ok(()) => true,
        Err(e) if is_exit_request(&e) => false,
        Err(e) => {
            eprintln!("Error executing {}: {}", path.display(), e);
            true
        }
    }
}

fn history_path() -> Option<PathBuf> {
    home::home_dir().map(|h| h.join(".tsuru_history"))
}

/// REPLループを実行する
fn run_repl(session: &mut Session) -> Result<()> {
    println!("Type 'help' for list of commands.");

    let mut rl = DefaultEditor::new()?;
    let history = history_path();
    if let Some(path) = history.as_deref() {
        if rl.load_history(path).is_err() {
            debug!(path = %path.display(), "no history file");
        }
    }

    let mut connected = true;
    loop {
        let line = match rl.readline("(tsuru) ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => {
                println!("exit");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        };

        let line = line.trim();
        if !line.is_empty() {
            rl.add_history_entry(line)?;
        }

        // 空行は直前のコマンドを繰り返す
        if let Err(e) = session.call(line) {
            if is_exit_request(&e) {
                break;
            }
            if is_connection_closed(&e) {
                eprintln!("{}", e);
                connected = false;
                break;
            }
            if is_process_exited(&e) {
                println!("{}", e);
            } else {
                println!("Command failed: {}", e);
            }
        }
    }

    if let Some(path) = history.as_deref() {
        if let Err(e) = rl.save_history(path) {
            warn!(path = %path.display(), "could not save history: {}", e);
        }
    }

    if !connected {
        return Ok(());
    }
    let kill = ask_kill(&mut rl, session)?;
    session.client().detach(kill)
}

/// 終了時にターゲットを終了させるか尋ねる
fn ask_kill(rl: &mut DefaultEditor, session: &mut Session) -> Result<bool> {
    if session.client().recorded() {
        return Ok(true);
    }
    loop {
        let answer = match rl.readline("Would you like to kill the process? [Y/n] ") {
            Ok(answer) => answer,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => return Ok(false),
            Err(err) => return Err(err.into()),
        };
        match answer.trim().to_lowercase().as_str() {
            "" | "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => println!("Please answer yes or no."),
        }
    }
}
