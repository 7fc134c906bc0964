//! 呼び出しコンテキストとスコーププレフィックス
//!
//! `goroutine <id> <cmd>`、`frame <idx> <cmd>`、`on <bp> <cmd>` は、
//! 新しいコンテキストを作って残りのコマンドを再帰的にディスパッチします。

use crate::breakpoints::resolve_breakpoint;
use crate::errors::{CommandError, ERR_NOT_ENOUGH_ARGUMENTS};
use crate::format::{format_thread, write_goroutine_long};
use crate::parse::{parse_int, split_command};
use crate::session::Session;
use crate::Result;
use std::io::Write;
use tracing::debug;
use tsuru_target::{Breakpoint, DebuggerState, EvalScope};

/// コマンドを修飾するプレフィックス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Prefix {
    #[default]
    None,
    /// `goroutine` / `frame` による評価スコープ指定
    Scope,
    /// `on` によるブレークポイントへのアクション束縛
    On,
}

/// コマンド1回分の呼び出しコンテキスト
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallContext {
    pub prefix: Prefix,
    pub scope: EvalScope,
    /// `on` プレフィックスで束縛されたブレークポイント
    pub breakpoint: Option<Breakpoint>,
}

impl CallContext {
    /// プレフィックス無し・現在のスコープ
    pub fn new() -> Self {
        Self::default()
    }

    /// 束縛されたブレークポイントを取得する
    pub fn bound_breakpoint(&mut self) -> Result<&mut Breakpoint> {
        self.breakpoint
            .as_mut()
            .ok_or_else(|| CommandError::usage("no breakpoint bound to this command").into())
    }
}

fn selected_goroutine_id(state: &DebuggerState) -> i64 {
    state.selected_goroutine.as_ref().map(|g| g.id).unwrap_or(-1)
}

/// `goroutine [<id>] [<command>]`
pub(crate) fn goroutine(s: &mut Session, ctx: &mut CallContext, args: &str) -> Result<()> {
    if ctx.prefix == Prefix::On {
        if !args.is_empty() {
            return Err(CommandError::usage("too many arguments to goroutine").into());
        }
        ctx.bound_breakpoint()?.goroutine = true;
        return Ok(());
    }

    let (id, rest) = split_command(args);
    if rest.is_empty() {
        if ctx.prefix == Prefix::Scope {
            return Err(CommandError::usage("no command passed to goroutine").into());
        }
        if id.is_empty() {
            return print_scope(s);
        }
        let gid = parse_int(id)?;
        let old = s.client.get_state()?;
        let new = s.client.switch_goroutine(gid)?;
        let thread = new
            .current_thread
            .as_ref()
            .map(|t| t.id.to_string())
            .unwrap_or_else(|| "<nil>".to_string());
        writeln!(
            s.out,
            "Switched from {} to {} (thread {})",
            selected_goroutine_id(&old),
            gid,
            thread
        )?;
        return Ok(());
    }

    let gid = parse_int(id)?;
    if ctx.prefix == Prefix::Scope && ctx.scope.goroutine_id != -1 && ctx.scope.goroutine_id != gid
    {
        return Err(CommandError::usage("conflicting goroutine prefixes").into());
    }
    let mut nested = ctx.clone();
    nested.prefix = Prefix::Scope;
    nested.scope.goroutine_id = gid;
    debug!(goroutine = gid, command = rest, "scope prefix");
    s.call_with_context(rest, &mut nested)
}

/// `frame <idx> <command>`
pub(crate) fn frame(s: &mut Session, ctx: &mut CallContext, args: &str) -> Result<()> {
    let (idx, rest) = split_command(args);
    if idx.is_empty() || rest.is_empty() {
        return Err(CommandError::usage(ERR_NOT_ENOUGH_ARGUMENTS).into());
    }
    let frame = parse_int(idx)?;
    if ctx.prefix == Prefix::Scope && ctx.scope.frame != 0 && ctx.scope.frame != frame {
        return Err(CommandError::usage("conflicting frame prefixes").into());
    }
    let mut nested = ctx.clone();
    nested.prefix = Prefix::Scope;
    nested.scope.frame = frame;
    debug!(frame, command = rest, "scope prefix");
    s.call_with_context(rest, &mut nested)
}

/// `on <bp> <command>`
///
/// 後続コマンドが成功した場合のみ、更新したブレークポイントをターゲットに反映します。
pub(crate) fn on(s: &mut Session, ctx: &mut CallContext, args: &str) -> Result<()> {
    let (reference, rest) = split_command(args);
    if rest.is_empty() {
        return Err(CommandError::usage(ERR_NOT_ENOUGH_ARGUMENTS).into());
    }
    let bp = resolve_breakpoint(s.client.as_mut(), reference)?;
    let mut nested = CallContext {
        prefix: Prefix::On,
        scope: ctx.scope,
        breakpoint: Some(bp),
    };
    s.call_with_context(rest, &mut nested)?;

    if let Some(bp) = nested.breakpoint.as_ref() {
        debug!(id = bp.id, "amend breakpoint");
        s.client.amend_breakpoint(bp)?;
    }
    Ok(())
}

/// 現在のスレッドと選択中のgoroutineを表示する
fn print_scope(s: &mut Session) -> Result<()> {
    let state = s.client.get_state()?;
    writeln!(s.out, "Thread {}", format_thread(state.current_thread.as_ref()))?;
    if let Some(g) = state.selected_goroutine.as_ref() {
        write_goroutine_long(s.out.as_mut(), g, "")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_context() {
        let ctx = CallContext::new();
        assert_eq!(ctx.prefix, Prefix::None);
        assert_eq!(ctx.scope, EvalScope::current());
        assert!(ctx.breakpoint.is_none());
    }

    #[test]
    fn test_bound_breakpoint_required() {
        let mut ctx = CallContext::new();
        assert!(ctx.bound_breakpoint().is_err());
        ctx.breakpoint = Some(Breakpoint::default());
        ctx.bound_breakpoint().unwrap().stacktrace = 4;
        assert_eq!(ctx.breakpoint.unwrap().stacktrace, 4);
    }
}
