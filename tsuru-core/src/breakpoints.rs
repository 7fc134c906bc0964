//! ブレークポイント管理コマンド
//!
//! break / trace / clear / clearall / breakpoints / condition。
//! ブレークポイントの変更はすべて明示的な amend 呼び出しでターゲットに反映します。

use crate::context::CallContext;
use crate::errors::{CommandError, ERR_NOT_ENOUGH_ARGUMENTS};
use crate::format::{format_breakpoint_location, format_breakpoint_name};
use crate::parse::split_command;
use crate::session::Session;
use crate::Result;
use std::collections::HashSet;
use std::io::Write;
use tracing::{debug, warn};
use tsuru_target::{valid_breakpoint_name, Breakpoint, EvalScope, TargetControl, TargetError};

/// ブレークポイント参照（IDまたは名前）を解決する
///
/// 整数ならIDとして、それ以外は名前として引きます。
/// 名前として不正な参照は、見つからない場合とは別のエラーになります。
pub fn resolve_breakpoint(client: &mut dyn TargetControl, reference: &str) -> Result<Breakpoint> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(CommandError::usage(ERR_NOT_ENOUGH_ARGUMENTS).into());
    }
    if let Ok(id) = reference.parse::<i64>() {
        return client.get_breakpoint(id);
    }
    if valid_breakpoint_name(reference).is_err() {
        return Err(CommandError::InvalidBreakpointRef(reference.to_string()).into());
    }
    client.get_breakpoint_by_name(reference)
}

/// `break [name] <locspec>` / `trace [name] <locspec>` の共通処理
fn set_breakpoint(s: &mut Session, tracepoint: bool, args: &str) -> Result<()> {
    let argstr = args.trim();
    if argstr.is_empty() {
        return Err(CommandError::usage("address required").into());
    }

    let mut requested = Breakpoint {
        tracepoint,
        ..Default::default()
    };
    let (first, rest) = split_command(argstr);
    let mut locspec = argstr;
    if !rest.is_empty() && valid_breakpoint_name(first).is_ok() {
        requested.name = first.to_string();
        locspec = rest;
    }

    let scope = EvalScope::current();
    let locations = match s.client.find_location(scope, locspec) {
        Ok(locations) => locations,
        Err(err) => {
            if requested.name.is_empty() {
                return Err(err);
            }
            debug!(name = %requested.name, "retrying without breakpoint name");
            requested.name.clear();
            locspec = argstr;
            match s.client.find_location(scope, locspec) {
                Ok(locations) => locations,
                Err(_) => return Err(err),
            }
        }
    };
    if locations.is_empty() {
        return Err(TargetError::LocationNotFound {
            locspec: locspec.to_string(),
        }
        .into());
    }

    if locations.len() > 1 && !requested.name.is_empty() {
        warn!(name = %requested.name, count = locations.len(), "named breakpoint resolves to several addresses");
        writeln!(
            s.out,
            "Warning: {} resolves to {} addresses, all of them are named {}",
            locspec,
            locations.len(),
            requested.name
        )?;
    }

    for loc in locations {
        requested.addr = loc.pc;
        let bp = s.client.create_breakpoint(&requested)?;
        writeln!(
            s.out,
            "{} set at {}",
            format_breakpoint_name(&bp, true),
            format_breakpoint_location(&bp)
        )?;
    }
    Ok(())
}

/// `break [name] <locspec>`
pub(crate) fn breakpoint(s: &mut Session, _: &mut CallContext, args: &str) -> Result<()> {
    set_breakpoint(s, false, args)
}

/// `trace [name] <locspec>`
pub(crate) fn tracepoint(s: &mut Session, _: &mut CallContext, args: &str) -> Result<()> {
    set_breakpoint(s, true, args)
}

/// `clear <bp>`
pub(crate) fn clear(s: &mut Session, _: &mut CallContext, args: &str) -> Result<()> {
    let args = args.trim();
    if args.is_empty() {
        return Err(CommandError::usage(ERR_NOT_ENOUGH_ARGUMENTS).into());
    }
    let bp = match args.parse::<i64>() {
        Ok(id) => s.client.clear_breakpoint(id)?,
        Err(_) => s.client.clear_breakpoint_by_name(args)?,
    };
    writeln!(
        s.out,
        "{} cleared at {}",
        format_breakpoint_name(&bp, true),
        format_breakpoint_location(&bp)
    )?;
    Ok(())
}

/// `clearall [<locspec>]`
///
/// 内部用（負のID）のブレークポイントは削除しません。
pub(crate) fn clear_all(s: &mut Session, _: &mut CallContext, args: &str) -> Result<()> {
    let breakpoints = s.client.list_breakpoints()?;

    let filter: Option<HashSet<u64>> = if args.is_empty() {
        None
    } else {
        let locations = s.client.find_location(EvalScope::current(), args)?;
        Some(locations.iter().map(|l| l.pc).collect())
    };

    for bp in breakpoints {
        if let Some(addrs) = filter.as_ref() {
            if !addrs.contains(&bp.addr) {
                continue;
            }
        }
        if bp.id < 0 {
            continue;
        }
        match s.client.clear_breakpoint(bp.id) {
            Ok(_) => writeln!(
                s.out,
                "{} cleared at {}",
                format_breakpoint_name(&bp, true),
                format_breakpoint_location(&bp)
            )?,
            Err(e) => writeln!(
                s.out,
                "Couldn't delete {} at {}: {}",
                format_breakpoint_name(&bp, false),
                format_breakpoint_location(&bp),
                e
            )?,
        }
    }
    Ok(())
}

/// `breakpoints`
pub(crate) fn breakpoints(s: &mut Session, _: &mut CallContext, _: &str) -> Result<()> {
    let mut breakpoints = s.client.list_breakpoints()?;
    breakpoints.sort_by_key(|bp| bp.id);
    for bp in &breakpoints {
        writeln!(
            s.out,
            "{} at {} ({})",
            format_breakpoint_name(bp, true),
            format_breakpoint_location(bp),
            bp.total_hit_count
        )?;

        let mut attrs = Vec::new();
        if !bp.cond.is_empty() {
            attrs.push(format!("\tcond {}", bp.cond));
        }
        if bp.stacktrace != 0 {
            attrs.push(format!("\tstack {}", bp.stacktrace));
        }
        if bp.goroutine {
            attrs.push("\tgoroutine".to_string());
        }
        if let Some(cfg) = bp.load_args {
            if cfg.is_long() {
                attrs.push("\targs -v".to_string());
            } else {
                attrs.push("\targs".to_string());
            }
        }
        if let Some(cfg) = bp.load_locals {
            if cfg.is_long() {
                attrs.push("\tlocals -v".to_string());
            } else {
                attrs.push("\tlocals".to_string());
            }
        }
        for expr in &bp.variables {
            attrs.push(format!("\tprint {}", expr));
        }
        for attr in attrs {
            writeln!(s.out, "{}", attr)?;
        }
    }
    Ok(())
}

/// `condition <bp> <expr>`
pub(crate) fn condition(s: &mut Session, _: &mut CallContext, args: &str) -> Result<()> {
    let (reference, expr) = split_command(args);
    if reference.is_empty() || expr.is_empty() {
        return Err(CommandError::usage(ERR_NOT_ENOUGH_ARGUMENTS).into());
    }
    let mut bp = resolve_breakpoint(s.client.as_mut(), reference)?;
    bp.cond = expr.to_string();
    debug!(id = bp.id, cond = %bp.cond, "amend breakpoint");
    s.client.amend_breakpoint(&bp)
}
