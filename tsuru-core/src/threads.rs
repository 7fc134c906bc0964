//! スレッド・goroutine一覧と切り替え

use crate::context::CallContext;
use crate::errors::{CommandError, ERR_NOT_ENOUGH_ARGUMENTS};
use crate::format::{
    display_function_name, format_goroutine, format_thread, shorten_file_path, GoroutineLocation,
};
use crate::parse::parse_int;
use crate::session::Session;
use crate::Result;
use std::io::Write;

/// `threads`
pub(crate) fn threads(s: &mut Session, _: &mut CallContext, _: &str) -> Result<()> {
    let mut threads = s.client.list_threads()?;
    let state = s.client.get_state()?;
    let current = state.current_thread.as_ref().map(|t| t.id);
    threads.sort_by_key(|t| t.id);

    for th in &threads {
        let marker = if Some(th.id) == current { "*" } else { " " };
        match th.function.as_ref() {
            Some(f) => writeln!(
                s.out,
                "{} Thread {} at {:#x} {}:{} {}",
                marker,
                th.id,
                th.pc,
                shorten_file_path(&th.file),
                th.line,
                display_function_name(&f.name)
            )?,
            None => writeln!(s.out, "{} Thread {}", marker, format_thread(Some(th)))?,
        }
    }
    Ok(())
}

/// `thread <id>`
pub(crate) fn thread(s: &mut Session, _: &mut CallContext, args: &str) -> Result<()> {
    if args.is_empty() {
        return Err(CommandError::usage(ERR_NOT_ENOUGH_ARGUMENTS).into());
    }
    let tid = parse_int(args)?;
    let old = s.client.get_state()?;
    let new = s.client.switch_thread(tid)?;

    let describe = |state: &tsuru_target::DebuggerState| {
        state
            .current_thread
            .as_ref()
            .map(|t| t.id.to_string())
            .unwrap_or_else(|| "<none>".to_string())
    };
    writeln!(s.out, "Switched from {} to {}", describe(&old), describe(&new))?;
    Ok(())
}

/// `goroutines [-u|-r|-g]`
pub(crate) fn goroutines(s: &mut Session, _: &mut CallContext, args: &str) -> Result<()> {
    let flags: Vec<&str> = args.split_whitespace().collect();
    let kind = match flags.as_slice() {
        [] | ["-u"] => GoroutineLocation::User,
        ["-r"] => GoroutineLocation::Runtime,
        ["-g"] => GoroutineLocation::Go,
        [flag] => return Err(CommandError::usage(format!("invalid argument: {}", flag)).into()),
        _ => return Err(CommandError::usage("too many arguments").into()),
    };

    let state = s.client.get_state()?;
    let selected = state.selected_goroutine.as_ref().map(|g| g.id);
    let mut goroutines = s.client.list_goroutines()?;
    goroutines.sort_by_key(|g| g.id);

    writeln!(s.out, "[{} goroutines]", goroutines.len())?;
    for g in &goroutines {
        let marker = if Some(g.id) == selected { "*" } else { " " };
        writeln!(s.out, "{} Goroutine {}", marker, format_goroutine(g, kind))?;
    }
    Ok(())
}
