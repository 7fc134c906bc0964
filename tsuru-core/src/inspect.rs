//! 状態参照コマンド
//!
//! 変数の評価・一覧、スタック、ソース表示、逆アセンブル、シンボル一覧を扱います。
//! `on` プレフィックス付きの場合は、ブレークポイントヒット時のアクションとして登録します。

use crate::context::{CallContext, Prefix};
use crate::errors::{CommandError, ERR_NOT_ENOUGH_ARGUMENTS, ERR_NO_CURRENT_THREAD};
use crate::format::{print_disassembly, print_stack};
use crate::parse::{parse_address, parse_stack_args, parse_var_arguments};
use crate::session::Session;
use crate::Result;
use anyhow::anyhow;
use regex::Regex;
use std::io::Write;
use tsuru_target::{AsmFlavour, EvalScope, LoadConfig, Location, TargetError, Variable, SHORT_LOAD_CONFIG};

/// `print <expr>`
pub(crate) fn print_var(s: &mut Session, ctx: &mut CallContext, args: &str) -> Result<()> {
    if args.is_empty() {
        return Err(CommandError::usage(ERR_NOT_ENOUGH_ARGUMENTS).into());
    }
    if ctx.prefix == Prefix::On {
        ctx.bound_breakpoint()?.variables.push(args.to_string());
        return Ok(());
    }
    let cfg = s.load_config();
    let val = s.client.eval_variable(ctx.scope, args, cfg)?;
    writeln!(s.out, "{}", val.multi_line(""))?;
    Ok(())
}

/// `whatis <expr>`
pub(crate) fn whatis(s: &mut Session, ctx: &mut CallContext, args: &str) -> Result<()> {
    if args.is_empty() {
        return Err(CommandError::usage(ERR_NOT_ENOUGH_ARGUMENTS).into());
    }
    let val = s.client.eval_variable(ctx.scope, args, SHORT_LOAD_CONFIG)?;
    writeln!(s.out, "{}", val.type_name)?;
    if !val.real_type.is_empty() && val.real_type != val.type_name {
        writeln!(s.out, "Real type: {}", val.real_type)?;
    }
    if val.kind == "interface" {
        if let Some(concrete) = val.children.first() {
            writeln!(s.out, "Concrete type: {}", concrete.type_name)?;
        }
    }
    if s.config.show_location_expr && !val.location_expr.is_empty() {
        writeln!(s.out, "{}", val.location_expr)?;
    }
    Ok(())
}

/// `set <lhs> = <rhs>` を分割する
///
/// `==` `!=` `<=` `>=` の一部としての `=` は代入とみなしません。
fn split_assignment(args: &str) -> Option<(&str, &str)> {
    let bytes = args.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b != b'=' {
            continue;
        }
        let prev = if i > 0 { bytes[i - 1] } else { 0 };
        let next = bytes.get(i + 1).copied().unwrap_or(0);
        if next == b'=' || matches!(prev, b'=' | b'!' | b'<' | b'>' | b':') {
            continue;
        }
        let (lhs, rhs) = (args[..i].trim(), args[i + 1..].trim());
        if lhs.is_empty() || rhs.is_empty() {
            return None;
        }
        return Some((lhs, rhs));
    }
    None
}

/// `set <lhs> = <rhs>`
pub(crate) fn set_var(s: &mut Session, ctx: &mut CallContext, args: &str) -> Result<()> {
    let (lhs, rhs) = split_assignment(args)
        .ok_or_else(|| CommandError::usage("syntax error '=' not found"))?;
    s.client.set_variable(ctx.scope, lhs, rhs)
}

/// 名前がフィルターに一致する変数を表示する
fn print_filtered_variables(
    out: &mut dyn Write,
    kind: &str,
    vars: &[Variable],
    filter: &str,
    cfg: LoadConfig,
) -> Result<()> {
    let re = Regex::new(filter)
        .map_err(|e| CommandError::usage(format!("invalid filter argument: {}", e)))?;
    let mut matched = false;
    for v in vars.iter().filter(|v| re.is_match(&v.name)) {
        matched = true;
        let name = if v.shadowed {
            format!("({})", v.name)
        } else {
            v.name.clone()
        };
        if cfg == SHORT_LOAD_CONFIG {
            writeln!(out, "{} = {}", name, v.single_line())?;
        } else {
            writeln!(out, "{} = {}", name, v.multi_line(""))?;
        }
    }
    if !matched {
        writeln!(out, "(no {})", kind)?;
    }
    Ok(())
}

/// `args [-v] [<regex>]`
pub(crate) fn args(s: &mut Session, ctx: &mut CallContext, args: &str) -> Result<()> {
    let (filter, cfg) = parse_var_arguments(args, s.load_config());
    if ctx.prefix == Prefix::On {
        if !filter.is_empty() {
            return Err(CommandError::usage("filter not supported on breakpoint").into());
        }
        ctx.bound_breakpoint()?.load_args = Some(cfg);
        return Ok(());
    }
    let vars = s.client.list_function_args(ctx.scope, cfg)?;
    print_filtered_variables(s.out.as_mut(), "args", &vars, filter, cfg)
}

/// `locals [-v] [<regex>]`
pub(crate) fn locals(s: &mut Session, ctx: &mut CallContext, args: &str) -> Result<()> {
    let (filter, cfg) = parse_var_arguments(args, s.load_config());
    if ctx.prefix == Prefix::On {
        if !filter.is_empty() {
            return Err(CommandError::usage("filter not supported on breakpoint").into());
        }
        ctx.bound_breakpoint()?.load_locals = Some(cfg);
        return Ok(());
    }
    let vars = s.client.list_local_variables(ctx.scope, cfg)?;
    print_filtered_variables(s.out.as_mut(), "locals", &vars, filter, cfg)
}

/// `vars [-v] [<regex>]`
pub(crate) fn vars(s: &mut Session, _: &mut CallContext, args: &str) -> Result<()> {
    let (filter, cfg) = parse_var_arguments(args, s.load_config());
    let vars = s.client.list_package_variables(filter, cfg)?;
    print_filtered_variables(s.out.as_mut(), "vars", &vars, filter, cfg)
}

/// `regs [-a]`
pub(crate) fn regs(s: &mut Session, _: &mut CallContext, args: &str) -> Result<()> {
    let include_fp = match args.trim() {
        "" => false,
        "-a" => true,
        other => return Err(CommandError::usage(format!("invalid argument: {}", other)).into()),
    };
    let regs = s.client.list_registers(0, include_fp)?;
    write!(s.out, "{}", regs)?;
    if !regs.ends_with('\n') {
        writeln!(s.out)?;
    }
    Ok(())
}

/// `stack [<depth>] [-full] [-offsets]`
pub(crate) fn stack(s: &mut Session, ctx: &mut CallContext, args: &str) -> Result<()> {
    let sa = parse_stack_args(args)?;
    if ctx.prefix == Prefix::On {
        ctx.bound_breakpoint()?.stacktrace = sa.depth;
        return Ok(());
    }
    let cfg = if sa.full { Some(SHORT_LOAD_CONFIG) } else { None };
    let frames = s.client.stacktrace(ctx.scope.goroutine_id, sa.depth, cfg)?;
    print_stack(s.out.as_mut(), &frames, "", sa.offsets)?;
    Ok(())
}

/// スコープで指定されたフレームの位置を取得する
fn frame_location(s: &mut Session, scope: EvalScope) -> Result<Location> {
    let frames = s.client.stacktrace(scope.goroutine_id, scope.frame, None)?;
    usize::try_from(scope.frame)
        .ok()
        .and_then(|idx| frames.get(idx))
        .map(|f| f.location.clone())
        .ok_or_else(|| anyhow!("Invalid frame {}", scope.frame))
}

/// `list [<locspec>]`
pub(crate) fn list(s: &mut Session, ctx: &mut CallContext, args: &str) -> Result<()> {
    let scoped = ctx.prefix == Prefix::Scope;
    if scoped && !args.is_empty() {
        return Err(CommandError::usage("location can not be specified with goroutine or frame").into());
    }

    if scoped {
        let loc = frame_location(s, ctx.scope)?;
        return s.print_file(&loc.file, loc.line, true);
    }

    if args.is_empty() {
        let state = s.client.get_state()?;
        let th = state
            .current_thread
            .ok_or_else(|| anyhow!(ERR_NO_CURRENT_THREAD))?;
        return s.print_file(&th.file, th.line, true);
    }

    let locations = s.client.find_location(ctx.scope, args)?;
    match locations.as_slice() {
        [] => Err(TargetError::LocationNotFound {
            locspec: args.to_string(),
        }
        .into()),
        [loc] => s.print_file(&loc.file, loc.line, false),
        many => Err(anyhow!(
            "Location \"{}\" ambiguous: {} locations",
            args,
            many.len()
        )),
    }
}

/// `disassemble [-a <start> <end>] [-l <locspec>]`
pub(crate) fn disassemble(s: &mut Session, ctx: &mut CallContext, args: &str) -> Result<()> {
    let flavour = AsmFlavour::default();
    let tokens: Vec<&str> = args.split_whitespace().collect();
    let instructions = match tokens.as_slice() {
        [] => {
            let pc = if ctx.prefix == Prefix::Scope {
                frame_location(s, ctx.scope)?.pc
            } else {
                let state = s.client.get_state()?;
                state
                    .current_thread
                    .map(|t| t.pc)
                    .ok_or_else(|| anyhow!(ERR_NO_CURRENT_THREAD))?
            };
            s.client.disassemble_pc(ctx.scope, pc, flavour)?
        }
        ["-a", start, end] => {
            let start = parse_address(start)?;
            let end = parse_address(end)?;
            s.client.disassemble_range(ctx.scope, start, end, flavour)?
        }
        ["-a", ..] => {
            return Err(CommandError::usage("wrong number of arguments to disassemble -a").into())
        }
        ["-l", locspec @ ..] if !locspec.is_empty() => {
            let locspec = locspec.join(" ");
            let locations = s.client.find_location(ctx.scope, &locspec)?;
            match locations.as_slice() {
                [loc] => s.client.disassemble_pc(ctx.scope, loc.pc, flavour)?,
                _ => return Err(anyhow!("expression specifies multiple locations")),
            }
        }
        _ => return Err(CommandError::usage("wrong arguments to disassemble").into()),
    };
    print_disassembly(s.out.as_mut(), &instructions)?;
    Ok(())
}

fn print_sorted(out: &mut dyn Write, mut items: Vec<String>) -> Result<()> {
    items.sort();
    for item in items {
        writeln!(out, "{}", item)?;
    }
    Ok(())
}

/// `sources [<regex>]`
pub(crate) fn sources(s: &mut Session, _: &mut CallContext, args: &str) -> Result<()> {
    let items = s.client.list_sources(args)?;
    print_sorted(s.out.as_mut(), items)
}

/// `funcs [<regex>]`
pub(crate) fn funcs(s: &mut Session, _: &mut CallContext, args: &str) -> Result<()> {
    let items = s.client.list_functions(args)?;
    print_sorted(s.out.as_mut(), items)
}

/// `types [<regex>]`
pub(crate) fn types(s: &mut Session, _: &mut CallContext, args: &str) -> Result<()> {
    let items = s.client.list_types(args)?;
    print_sorted(s.out.as_mut(), items)
}
