//! 実行制御コマンド
//!
//! continue / step / next / stepout / step-instruction / rewind / restart。
//! 状態ストリームは必ず最後まで読み、各状態を表示します。

use crate::context::{CallContext, Prefix};
use crate::errors::{CommandError, ERR_EMPTY_STREAM, ERR_FRAME_PREFIX};
use crate::format::format_breakpoint_name;
use crate::session::Session;
use crate::Result;
use anyhow::anyhow;
use std::io::Write;
use tracing::{debug, warn};
use tsuru_target::{DebuggerState, StateStream, TargetControl, TargetError};

/// 完了まで継続が必要な実行制御
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepKind {
    Step,
    Next,
    StepOut,
}

impl StepKind {
    fn name(self) -> &'static str {
        match self {
            StepKind::Step => "step",
            StepKind::Next => "next",
            StepKind::StepOut => "stepout",
        }
    }

    fn issue(self, client: &mut dyn TargetControl) -> StateStream {
        match self {
            StepKind::Step => client.step(),
            StepKind::Next => client.next(),
            StepKind::StepOut => client.step_out(),
        }
    }
}

/// 状態がエラーを表していればそのエラー
fn state_error(state: &DebuggerState) -> Option<anyhow::Error> {
    if let Some(err) = &state.error {
        return Some(err.clone().into());
    }
    if state.exited {
        return Some(
            TargetError::ProcessExited {
                pid: state.pid,
                status: state.exit_status,
            }
            .into(),
        );
    }
    state
        .err
        .as_ref()
        .map(|msg| TargetError::remote(msg.clone()).into())
}

impl Session {
    /// 状態ストリームを最後まで読み、各状態を表示する
    ///
    /// エラー状態があれば残りを読み捨て、分かる範囲でソースを表示してからそのエラーを返します。
    pub(crate) fn consume_stream(&mut self, stream: StateStream) -> Result<DebuggerState> {
        let mut last = None;
        let mut failure: Option<anyhow::Error> = None;
        for state in stream {
            if failure.is_some() {
                debug!("discarding state after error");
                continue;
            }
            if let Some(err) = state_error(&state) {
                failure = Some(err);
                continue;
            }
            if let Err(err) = self.print_context(&state) {
                failure = Some(err);
                continue;
            }
            last = Some(state);
        }

        if let Some(err) = failure {
            self.print_file_no_state();
            return Err(err);
        }
        last.ok_or_else(|| anyhow!(ERR_EMPTY_STREAM))
    }

    /// 要求した操作が完了するまで continue を繰り返す
    fn continue_until_complete(&mut self, mut state: DebuggerState, op: &str) -> Result<()> {
        while state.next_in_progress {
            writeln!(self.out, "\tbreakpoint hit during {}, continuing...", op)?;
            let stream = self.client.continue_execution();
            state = self.consume_stream(stream)?;
        }
        self.print_stop_file(&state);
        Ok(())
    }
}

/// スコーププレフィックスを実行制御に反映する
///
/// フレーム指定は受け付けず、goroutine指定があればそのgoroutineに切り替えます。
fn scope_prefix_switch(s: &mut Session, ctx: &CallContext) -> Result<()> {
    if ctx.prefix != Prefix::Scope {
        return Ok(());
    }
    if ctx.scope.frame != 0 {
        return Err(CommandError::usage(ERR_FRAME_PREFIX).into());
    }
    if ctx.scope.goroutine_id > 0 {
        s.client.switch_goroutine(ctx.scope.goroutine_id)?;
    }
    Ok(())
}

fn run_step(s: &mut Session, ctx: &CallContext, kind: StepKind) -> Result<()> {
    scope_prefix_switch(s, ctx)?;
    let stream = kind.issue(s.client.as_mut());
    let state = s.consume_stream(stream)?;
    s.continue_until_complete(state, kind.name())
}

/// `continue`
pub(crate) fn cont(s: &mut Session, _: &mut CallContext, _: &str) -> Result<()> {
    let stream = s.client.continue_execution();
    let state = s.consume_stream(stream)?;
    s.print_stop_file(&state);
    Ok(())
}

/// `step`
pub(crate) fn step(s: &mut Session, ctx: &mut CallContext, _: &str) -> Result<()> {
    run_step(s, ctx, StepKind::Step)
}

/// `next`
pub(crate) fn next(s: &mut Session, ctx: &mut CallContext, _: &str) -> Result<()> {
    run_step(s, ctx, StepKind::Next)
}

/// `stepout`
pub(crate) fn stepout(s: &mut Session, ctx: &mut CallContext, _: &str) -> Result<()> {
    run_step(s, ctx, StepKind::StepOut)
}

/// `step-instruction`
pub(crate) fn step_instruction(s: &mut Session, ctx: &mut CallContext, _: &str) -> Result<()> {
    scope_prefix_switch(s, ctx)?;
    let stream = s.client.step_instruction();
    let state = s.consume_stream(stream)?;
    s.print_stop_file(&state);
    Ok(())
}

/// `rewind`
pub(crate) fn rewind(s: &mut Session, _: &mut CallContext, _: &str) -> Result<()> {
    let stream = s.client.rewind();
    let state = s.consume_stream(stream)?;
    s.print_stop_file(&state);
    Ok(())
}

/// `restart [<event or checkpoint>]`
pub(crate) fn restart(s: &mut Session, _: &mut CallContext, args: &str) -> Result<()> {
    let discarded = s.client.restart_from(args)?;
    for d in &discarded {
        warn!(id = d.breakpoint.id, "breakpoint discarded on restart");
        writeln!(
            s.out,
            "{} discarded because {}",
            format_breakpoint_name(&d.breakpoint, true),
            d.reason
        )?;
    }

    if !s.client.recorded() {
        writeln!(s.out, "Process restarted with PID {}", s.client.process_pid())?;
        return Ok(());
    }

    let state = s.client.get_state()?;
    s.print_context(&state)?;
    s.print_stop_file(&state);
    Ok(())
}
