//! チェックポイント関連コマンド（記録プロセスのみ）

use crate::context::CallContext;
use crate::errors::{CommandError, ERR_CHECKPOINT_ID, ERR_NO_CURRENT_THREAD};
use crate::format::align_columns;
use crate::session::Session;
use crate::Result;
use anyhow::anyhow;
use std::io::Write;
use tsuru_target::{DebuggerState, Location};

/// 現在位置からチェックポイントのラベルを作る
///
/// 選択中のgoroutineがあればその現在位置、無ければ現在のスレッドの位置を使います。
pub fn checkpoint_label(state: &DebuggerState) -> Result<String> {
    let loc = match (state.selected_goroutine.as_ref(), state.current_thread.as_ref()) {
        (Some(g), _) => g.current_loc.clone(),
        (None, Some(th)) => Location {
            pc: th.pc,
            file: th.file.clone(),
            line: th.line,
            function: th.function.clone(),
        },
        (None, None) => return Err(anyhow!(ERR_NO_CURRENT_THREAD)),
    };
    let fname = loc.function_name().unwrap_or("???");
    Ok(format!("{}() {}:{} ({:#x})", fname, loc.file, loc.line, loc.pc))
}

/// `checkpoint [<label>]`
pub(crate) fn checkpoint(s: &mut Session, _: &mut CallContext, args: &str) -> Result<()> {
    let label = if args.is_empty() {
        let state = s.client.get_state()?;
        checkpoint_label(&state)?
    } else {
        args.to_string()
    };
    let id = s.client.checkpoint(&label)?;
    writeln!(s.out, "Checkpoint c{} created.", id)?;
    Ok(())
}

/// `checkpoints`
pub(crate) fn checkpoints(s: &mut Session, _: &mut CallContext, _: &str) -> Result<()> {
    let checkpoints = s.client.list_checkpoints()?;
    let mut rows = vec![vec!["ID".to_string(), "When".to_string(), "Where".to_string()]];
    for cp in checkpoints {
        rows.push(vec![format!("c{}", cp.id), cp.when, cp.where_]);
    }
    write!(s.out, "{}", align_columns(&rows, 4, 2, ' '))?;
    Ok(())
}

/// `clear-checkpoint c<id>`
pub(crate) fn clear_checkpoint(s: &mut Session, _: &mut CallContext, args: &str) -> Result<()> {
    let id = parse_checkpoint_id(args)?;
    s.client.clear_checkpoint(id)
}

fn parse_checkpoint_id(args: &str) -> Result<i64> {
    let args = args.trim();
    if args.is_empty() {
        return Err(CommandError::usage("not enough arguments to clear-checkpoint").into());
    }
    let digits = args
        .strip_prefix('c')
        .ok_or_else(|| CommandError::usage(ERR_CHECKPOINT_ID))?;
    digits
        .parse::<i64>()
        .map_err(|_| CommandError::usage(ERR_CHECKPOINT_ID).into())
}
