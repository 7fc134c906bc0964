//! コマンドレジストリ
//!
//! 別名・許可されたプレフィックス・ヘルプ・ハンドラーの組を保持し、
//! 入力された先頭トークンからハンドラーを引きます。

use crate::context::{CallContext, Prefix};
use crate::errors::{CommandError, ExitRequest};
use crate::format::align_columns;
use crate::session::Session;
use crate::{breakpoints, checkpoints, config, context, execution, inspect, threads, Result};
use std::collections::BTreeMap;
use std::io::Write;
use tracing::debug;

/// コマンドハンドラー
pub type CommandFn = fn(&mut Session, &mut CallContext, &str) -> Result<()>;

/// コマンドが受け付けるプレフィックスの集合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Prefixes(u8);

impl Prefixes {
    pub const NONE: Prefixes = Prefixes(0);
    pub const SCOPE: Prefixes = Prefixes(1 << 0);
    pub const ON: Prefixes = Prefixes(1 << 1);

    pub const fn union(self, other: Prefixes) -> Prefixes {
        Prefixes(self.0 | other.0)
    }

    /// そのプレフィックス付きで実行できるか（プレフィックス無しは常に可）
    pub fn accepts(self, prefix: Prefix) -> bool {
        match prefix {
            Prefix::None => true,
            Prefix::Scope => self.0 & Self::SCOPE.0 != 0,
            Prefix::On => self.0 & Self::ON.0 != 0,
        }
    }
}

/// 登録されたコマンド
#[derive(Clone)]
pub struct Command {
    aliases: Vec<String>,
    /// 組み込みの別名（ユーザー別名のマージ前）
    builtin_aliases: Vec<String>,
    allowed_prefixes: Prefixes,
    help: String,
    handler: CommandFn,
}

impl Command {
    fn new(aliases: &[&str], allowed_prefixes: Prefixes, help: &str, handler: CommandFn) -> Self {
        let aliases: Vec<String> = aliases.iter().map(|a| a.to_string()).collect();
        Self {
            builtin_aliases: aliases.clone(),
            aliases,
            allowed_prefixes,
            help: help.to_string(),
            handler,
        }
    }

    /// 正規名（最初の別名）
    pub fn name(&self) -> &str {
        self.aliases.first().map(String::as_str).unwrap_or_default()
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn allowed_prefixes(&self) -> Prefixes {
        self.allowed_prefixes
    }

    /// 指定した名前がこのコマンドの別名か
    pub fn matches(&self, name: &str) -> bool {
        self.aliases.iter().any(|a| a == name)
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("aliases", &self.aliases)
            .field("allowed_prefixes", &self.allowed_prefixes)
            .finish_non_exhaustive()
    }
}

fn no_command(_: &mut Session, _: &mut CallContext, _: &str) -> Result<()> {
    Err(CommandError::NotAvailable.into())
}

fn nullary(_: &mut Session, _: &mut CallContext, _: &str) -> Result<()> {
    Ok(())
}

fn exit(_: &mut Session, _: &mut CallContext, _: &str) -> Result<()> {
    Err(ExitRequest.into())
}

fn source(s: &mut Session, _: &mut CallContext, args: &str) -> Result<()> {
    if args.is_empty() {
        return Err(CommandError::usage("wrong number of arguments: source <filename>").into());
    }
    s.execute_file(std::path::Path::new(args))
}

const RESTART_HELP: &str = "Restart process.\n\n\trestart";
const RESTART_RECORDED_HELP: &str = "Restart process from a checkpoint or event.\n\n  \
    restart [event number or checkpoint id]";

/// コマンド一覧
#[derive(Debug, Clone)]
pub struct Commands {
    cmds: Vec<Command>,
    last: Option<CommandFn>,
}

impl Commands {
    /// 既定のコマンド一覧を作成する
    ///
    /// `recorded` が真なら逆実行・チェックポイント関連のコマンドも登録します。
    pub fn new(recorded: bool) -> Self {
        let scope = Prefixes::SCOPE;
        let on_scope = Prefixes::ON.union(Prefixes::SCOPE);
        let none = Prefixes::NONE;

        let mut cmds = vec![
            Command::new(&["help", "h"], none, "Prints the help message.\n\n\thelp [command]\n\nType \"help\" followed by the name of a command for more information about it.", help),
            Command::new(&["break", "b"], none, "Sets a breakpoint.\n\n\tbreak [name] <linespec>\n\nA linespec is one of <file>:<line>, <function>, +<offset>, -<offset> or *<address>.", breakpoints::breakpoint),
            Command::new(&["trace", "t"], none, "Set tracepoint.\n\n\ttrace [name] <linespec>\n\nA tracepoint is a breakpoint that does not stop the execution of the program, instead when the tracepoint is hit a notification is displayed.", breakpoints::tracepoint),
            Command::new(&["restart", "r"], none, RESTART_HELP, execution::restart),
            Command::new(&["continue", "c"], none, "Run until breakpoint or program termination.", execution::cont),
            Command::new(&["step", "s"], scope, "Single step through program.", execution::step),
            Command::new(&["step-instruction", "si"], scope, "Single step a single cpu instruction.", execution::step_instruction),
            Command::new(&["next", "n"], scope, "Step over to next source line.", execution::next),
            Command::new(&["stepout"], scope, "Step out of the current function.", execution::stepout),
            Command::new(&["threads"], none, "Print out info for every traced thread.", threads::threads),
            Command::new(&["thread", "tr"], none, "Switch to the specified thread.\n\n\tthread <id>", threads::thread),
            Command::new(&["clear"], none, "Deletes breakpoint.\n\n\tclear <breakpoint name or id>", breakpoints::clear),
            Command::new(&["clearall", "clear-all"], none, "Deletes multiple breakpoints.\n\n\tclearall [<linespec>]\n\nIf called with the linespec argument it will delete all the breakpoints set at the specified location, otherwise it deletes all breakpoints.", breakpoints::clear_all),
            Command::new(&["goroutines"], none, "List program goroutines.\n\n\tgoroutines [-u (default: user location)|-r (runtime location)|-g (go statement location)]\n\nPrint out info for every goroutine. The flag controls what information is shown along with each goroutine:\n\n\t-u\tdisplays location of topmost stackframe in user code\n\t-r\tdisplays location of topmost stackframe (including frames inside private runtime functions)\n\t-g\tdisplays location of go instruction that created the goroutine\n\nIf no flag is specified the default is -u.", threads::goroutines),
            Command::new(&["goroutine"], on_scope, "Shows or changes current goroutine\n\n\tgoroutine\n\tgoroutine <id>\n\tgoroutine <id> <command>\n\nCalled without arguments it will show information about the current goroutine.\nCalled with a single argument it will switch to the specified goroutine.\nCalled with more arguments it will execute a command on the specified goroutine.", context::goroutine),
            Command::new(&["breakpoints", "bp"], none, "Print out info for active breakpoints.", breakpoints::breakpoints),
            Command::new(&["print", "p"], on_scope, "Evaluate an expression.\n\n\t[goroutine <n>] [frame <m>] print <expression>", inspect::print_var),
            Command::new(&["whatis"], scope, "Prints type of an expression.\n\n\twhatis <expression>", inspect::whatis),
            Command::new(&["set"], scope, "Changes the value of a variable.\n\n\t[goroutine <n>] [frame <m>] set <variable> = <value>\n\nOnly numerical variables and pointers can be changed.", inspect::set_var),
            Command::new(&["sources"], none, "Print list of source files.\n\n\tsources [<regex>]\n\nIf regex is specified only the source files matching it will be returned.", inspect::sources),
            Command::new(&["funcs"], none, "Print list of functions.\n\n\tfuncs [<regex>]\n\nIf regex is specified only the functions matching it will be returned.", inspect::funcs),
            Command::new(&["types"], none, "Print list of types\n\n\ttypes [<regex>]\n\nIf regex is specified only the types matching it will be returned.", inspect::types),
            Command::new(&["args"], on_scope, "Print function arguments.\n\n\t[goroutine <n>] [frame <m>] args [-v] [<regex>]\n\nIf regex is specified only function arguments with a name matching it will be returned. If -v is specified more information about each function argument will be shown.", inspect::args),
            Command::new(&["locals"], on_scope, "Print local variables.\n\n\t[goroutine <n>] [frame <m>] locals [-v] [<regex>]\n\nIf regex is specified only local variables with a name matching it will be returned. If -v is specified more information about each local variable will be shown.", inspect::locals),
            Command::new(&["vars"], none, "Print package variables.\n\n\tvars [-v] [<regex>]\n\nIf regex is specified only package variables with a name matching it will be returned. If -v is specified more information about each package variable will be shown.", inspect::vars),
            Command::new(&["regs"], none, "Print contents of CPU registers.\n\n\tregs [-a]\n\nArgument -a shows more registers.", inspect::regs),
            Command::new(&["exit", "quit", "q"], none, "Exit the debugger.", exit),
            Command::new(&["list", "ls"], scope, "Show source code.\n\n\t[goroutine <n>] [frame <m>] list [<linespec>]\n\nShow source around current point or provided linespec.", inspect::list),
            Command::new(&["stack", "bt"], on_scope, "Print stack trace.\n\n\t[goroutine <n>] [frame <m>] stack [<depth>] [-full] [-offsets]\n\n\t-full\tevery stackframe is decorated with the value of its local variables and arguments.\n\t-offsets\tprints frame offset of each frame", inspect::stack),
            Command::new(&["frame"], scope, "Executes command on a different frame.\n\n\tframe <frame index> <command>", context::frame),
            Command::new(&["source"], none, "Executes a file containing a list of commands\n\n\tsource <path>", source),
            Command::new(&["disassemble", "disass"], scope, "Disassembler.\n\n\t[goroutine <n>] [frame <m>] disassemble [-a <start> <end>] [-l <locspec>]\n\nIf no argument is specified the function being executed in the selected stack frame will be executed.\n\n\t-a <start> <end>\tdisassembles the specified address range\n\t-l <locspec>\t\tdisassembles the specified function", inspect::disassemble),
            Command::new(&["on"], none, "Executes a command when a breakpoint is hit.\n\n\ton <breakpoint name or id> <command>.\n\nSupported commands: print, stack and goroutine)", context::on),
            Command::new(&["condition", "cond"], none, "Set breakpoint condition.\n\n\tcondition <breakpoint name or id> <boolean expression>.\n\nSpecifies that the breakpoint or tracepoint should break only if the boolean expression is true.", breakpoints::condition),
            Command::new(&["config"], none, "Changes configuration parameters.\n\n\tconfig -list\n\nShow all configuration parameters.\n\n\tconfig -save\n\nSaves the configuration file to disk, overwriting the current configuration file.\n\n\tconfig <parameter> <value>\n\nChanges the value of a configuration parameter.\n\n\tconfig substitute-path <from> <to>\n\tconfig substitute-path <from>\n\nAdds or removes a path substitution rule.\n\n\tconfig alias <command> <alias>\n\tconfig alias <alias>\n\nDefines <alias> as an alias to <command> or removes an alias.", config::configure),
        ];

        if recorded {
            cmds.push(Command::new(&["rewind", "rw"], none, "Run backwards until breakpoint or program termination.", execution::rewind));
            cmds.push(Command::new(&["checkpoint", "check"], none, "Creates a checkpoint at the current position.\n\n\tcheckpoint [where]", checkpoints::checkpoint));
            cmds.push(Command::new(&["checkpoints"], none, "Print out info for existing checkpoints.", checkpoints::checkpoints));
            cmds.push(Command::new(&["clear-checkpoint", "clearcheck"], none, "Deletes checkpoint.\n\n\tclear-checkpoint <id>", checkpoints::clear_checkpoint));
            for cmd in cmds.iter_mut() {
                if cmd.matches("restart") {
                    cmd.help = RESTART_RECORDED_HELP.to_string();
                }
            }
        }

        cmds.sort_by(|a, b| a.name().cmp(b.name()));
        Self { cmds, last: None }
    }

    /// ハンドラーを登録する
    ///
    /// `name` が既存コマンドの別名なら、別名とヘルプを保ったままハンドラーだけを差し替えます。
    pub fn register(&mut self, name: &str, handler: CommandFn, help: &str) {
        if let Some(cmd) = self.cmds.iter_mut().find(|c| c.matches(name)) {
            cmd.handler = handler;
            return;
        }
        self.cmds
            .push(Command::new(&[name], Prefixes::NONE, help, handler));
    }

    /// 名前からハンドラーを引く
    ///
    /// 空文字列なら直前のコマンドを返します。見つかったコマンドは直前のコマンドとして記録されます。
    pub fn find(&mut self, name: &str, prefix: Prefix) -> CommandFn {
        if name.is_empty() {
            return self.last.unwrap_or(nullary);
        }
        match self
            .cmds
            .iter()
            .find(|c| c.matches(name) && c.allowed_prefixes.accepts(prefix))
        {
            Some(cmd) => {
                self.last = Some(cmd.handler);
                cmd.handler
            }
            None => {
                debug!(name, ?prefix, "no command");
                no_command
            }
        }
    }

    /// ユーザー定義の別名をマージする
    ///
    /// 組み込みの別名に戻してから追加するため、何度呼んでも結果は同じです。
    pub fn merge(&mut self, aliases: &BTreeMap<String, Vec<String>>) {
        for cmd in self.cmds.iter_mut() {
            cmd.aliases = cmd.builtin_aliases.clone();
        }
        for (name, extra) in aliases {
            if let Some(cmd) = self.cmds.iter_mut().find(|c| c.matches(name)) {
                cmd.aliases.extend(extra.iter().cloned());
            }
        }
    }

    /// 名前（別名を含む）からコマンドを探す
    pub fn get(&self, name: &str) -> Option<&Command> {
        self.cmds.iter().find(|c| c.matches(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.cmds.iter()
    }
}

/// `help [command]`
fn help(s: &mut Session, _: &mut CallContext, args: &str) -> Result<()> {
    if !args.is_empty() {
        let text = s
            .commands
            .get(args)
            .map(|c| c.help().to_string())
            .ok_or(CommandError::NotAvailable)?;
        writeln!(s.out, "{}", text)?;
        return Ok(());
    }

    writeln!(s.out, "The following commands are available:")?;
    let rows: Vec<Vec<String>> = s
        .commands
        .iter()
        .map(|cmd| {
            let summary = cmd.help().lines().next().unwrap_or_default();
            let name = if cmd.aliases().len() > 1 {
                format!("{} (alias: {})", cmd.name(), cmd.aliases()[1..].join(" | "))
            } else {
                cmd.name().to_string()
            };
            vec![format!("    {} ", name), format!(" {}", summary)]
        })
        .collect();
    write!(s.out, "{}", align_columns(&rows, 0, 0, '-'))?;
    writeln!(s.out)?;
    writeln!(
        s.out,
        "Type help followed by a command for full documentation."
    )?;
    Ok(())
}
