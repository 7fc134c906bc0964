//! 表示用の整形
//!
//! 停止位置のコンテキスト、スタック、goroutine、ブレークポイント、
//! ソースコードの表示を担当します。値そのものの整形はターゲット側の責務です。

use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::time::SystemTime;
use tsuru_target::{
    AsmInstruction, Breakpoint, DebuggerState, Function, Goroutine, Location, Stackframe, Thread,
    SHORT_LOAD_CONFIG,
};

/// 最適化された関数をデバッグしている場合の警告
pub const OPTIMIZED_FUNCTION_WARNING: &str = "Warning: debugging optimized function";

/// ソース表示の前後行数
const SOURCE_CONTEXT_LINES: u32 = 5;

/// 関数名を表示用に整形する（Rustのマングル名ならデマングル）
pub fn display_function_name(name: &str) -> String {
    match rustc_demangle::try_demangle(name) {
        Ok(demangled) => format!("{:#}", demangled),
        Err(_) => name.to_string(),
    }
}

fn function_name(function: Option<&Function>) -> String {
    function
        .map(|f| display_function_name(&f.name))
        .unwrap_or_default()
}

/// カレントディレクトリを `.` に置き換えてパスを短くする
pub fn shorten_file_path(full_path: &str) -> String {
    match std::env::current_dir() {
        Ok(dir) => {
            let dir = dir.to_string_lossy();
            if !dir.is_empty() && full_path.starts_with(dir.as_ref()) {
                format!(".{}", &full_path[dir.len()..])
            } else {
                full_path.to_string()
            }
        }
        Err(_) => full_path.to_string(),
    }
}

/// `breakpoint 3` / `Tracepoint name` 形式の名前
pub fn format_breakpoint_name(bp: &Breakpoint, upcase: bool) -> String {
    let thing = match (bp.tracepoint, upcase) {
        (true, true) => "Tracepoint",
        (true, false) => "tracepoint",
        (false, true) => "Breakpoint",
        (false, false) => "breakpoint",
    };
    if bp.name.is_empty() {
        format!("{} {}", thing, bp.id)
    } else {
        format!("{} {}", thing, bp.name)
    }
}

/// `0x1000 for main.worker() ./main.go:42` 形式の位置
pub fn format_breakpoint_location(bp: &Breakpoint) -> String {
    let path = shorten_file_path(&bp.file);
    if bp.function_name.is_empty() {
        format!("{:#x} for {}:{}", bp.addr, path, bp.line)
    } else {
        format!(
            "{:#x} for {}() {}:{}",
            bp.addr,
            display_function_name(&bp.function_name),
            path,
            bp.line
        )
    }
}

/// スレッドを一行で表示する
pub fn format_thread(th: Option<&Thread>) -> String {
    match th {
        Some(th) => format!("{} at {}:{}", th.id, shorten_file_path(&th.file), th.line),
        None => "<nil>".to_string(),
    }
}

/// 位置を一行で表示する
pub fn format_location(loc: &Location) -> String {
    format!(
        "{}:{} {} ({:#x})",
        shorten_file_path(&loc.file),
        loc.line,
        function_name(loc.function.as_ref()),
        loc.pc
    )
}

/// goroutine一覧でどの位置を表示するか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoroutineLocation {
    /// ランタイム内部を含む現在位置（`-r`）
    Runtime,
    /// ユーザーコード上の現在位置（`-u`、既定）
    User,
    /// 生成元の文（`-g`）
    Go,
}

/// goroutineを一行で表示する
pub fn format_goroutine(g: &Goroutine, kind: GoroutineLocation) -> String {
    let (label, loc) = match kind {
        GoroutineLocation::Runtime => ("Runtime", &g.current_loc),
        GoroutineLocation::User => ("User", &g.user_current_loc),
        GoroutineLocation::Go => ("Go", &g.go_statement_loc),
    };
    let thread = if g.thread_id != 0 {
        format!(" (thread {})", g.thread_id)
    } else {
        String::new()
    };
    format!("{} - {}: {}{}", g.id, label, format_location(loc), thread)
}

/// goroutineの3種類の位置をすべて表示する
pub fn write_goroutine_long(out: &mut dyn Write, g: &Goroutine, prefix: &str) -> io::Result<()> {
    writeln!(out, "{}Goroutine {}:", prefix, g.id)?;
    writeln!(out, "{}\tRuntime: {}", prefix, format_location(&g.current_loc))?;
    writeln!(out, "{}\tUser: {}", prefix, format_location(&g.user_current_loc))?;
    writeln!(out, "{}\tGo: {}", prefix, format_location(&g.go_statement_loc))
}

/// 10進数での桁数
fn digits(n: usize) -> usize {
    n.to_string().len()
}

/// 符号付きの16進数表記（`+0x10` / `-0x10`）
fn signed_hex(n: i64) -> String {
    if n < 0 {
        format!("-{:#x}", n.unsigned_abs())
    } else {
        format!("+{:#x}", n)
    }
}

/// スタックトレースを表示する
pub fn print_stack(
    out: &mut dyn Write,
    stack: &[Stackframe],
    indent: &str,
    offsets: bool,
) -> io::Result<()> {
    if stack.is_empty() {
        return Ok(());
    }
    let d = digits(stack.len() - 1);
    let pad = format!("{}{}", indent, " ".repeat(d + 2 + indent.len()));

    for (i, frame) in stack.iter().enumerate() {
        if !frame.err.is_empty() {
            writeln!(out, "{}error: {}", pad, frame.err)?;
            continue;
        }
        let name = frame
            .location
            .function
            .as_ref()
            .map(|f| display_function_name(&f.name))
            .unwrap_or_else(|| "(nil)".to_string());
        writeln!(
            out,
            "{}{:>width$}  0x{:016x} in {}",
            indent,
            i,
            frame.location.pc,
            name,
            width = d
        )?;
        writeln!(
            out,
            "{}at {}:{}",
            pad,
            shorten_file_path(&frame.location.file),
            frame.location.line
        )?;
        if offsets {
            writeln!(
                out,
                "{}frame: {} frame pointer {}",
                pad,
                signed_hex(frame.frame_offset),
                signed_hex(frame.frame_pointer_offset)
            )?;
        }
        for v in frame.arguments.iter().chain(frame.locals.iter()) {
            writeln!(out, "{}    {} = {}", pad, v.name, v.single_line())?;
        }
    }
    Ok(())
}

/// 停止したスレッドのコンテキストを表示する
///
/// ブレークポイントで停止していればヒット回数と、
/// ブレークポイントに束縛された遅延アクションの結果も表示します。
pub fn print_context_thread(out: &mut dyn Write, th: &Thread) -> io::Result<()> {
    let fname = function_name(th.function.as_ref());
    let optimized = th.function.as_ref().is_some_and(|f| f.optimized);

    let Some(bp) = th.breakpoint.as_ref() else {
        writeln!(
            out,
            "> {}() {}:{} (PC: {:#x})",
            fname,
            shorten_file_path(&th.file),
            th.line,
            th.pc
        )?;
        if optimized {
            writeln!(out, "{}", OPTIMIZED_FUNCTION_WARNING)?;
        }
        return Ok(());
    };

    let mut args = String::new();
    if let Some(info) = th.breakpoint_info.as_ref() {
        if bp.load_args == Some(SHORT_LOAD_CONFIG) {
            let values: Vec<String> = info.arguments.iter().map(|a| a.single_line()).collect();
            args = values.join(", ");
        }
    }

    let bpname = if bp.name.is_empty() {
        String::new()
    } else {
        format!("[{}] ", bp.name)
    };

    match bp.hit_count.get(&th.goroutine_id.to_string()) {
        Some(hits) => writeln!(
            out,
            "> {}{}({}) {}:{} (hits goroutine({}):{} total:{}) (PC: {:#x})",
            bpname,
            fname,
            args,
            shorten_file_path(&th.file),
            th.line,
            th.goroutine_id,
            hits,
            bp.total_hit_count,
            th.pc
        )?,
        None => writeln!(
            out,
            "> {}{}({}) {}:{} (hits total:{}) (PC: {:#x})",
            bpname,
            fname,
            args,
            shorten_file_path(&th.file),
            th.line,
            bp.total_hit_count,
            th.pc
        )?,
    }
    if optimized {
        writeln!(out, "{}", OPTIMIZED_FUNCTION_WARNING)?;
    }

    let Some(info) = th.breakpoint_info.as_ref() else {
        return Ok(());
    };

    if let Some(g) = info.goroutine.as_ref() {
        write_goroutine_long(out, g, "\t")?;
    }
    for v in &info.variables {
        writeln!(out, "\t{}: {}", v.name, v.multi_line("\t"))?;
    }
    for v in &info.locals {
        if bp.load_locals.is_some_and(|cfg| cfg.is_long()) {
            writeln!(out, "\t{}: {}", v.name, v.multi_line("\t"))?;
        } else {
            writeln!(out, "\t{}: {}", v.name, v.single_line())?;
        }
    }
    if bp.load_args.is_some_and(|cfg| cfg.is_long()) {
        for v in &info.arguments {
            writeln!(out, "\t{}: {}", v.name, v.multi_line("\t"))?;
        }
    }
    if !info.stacktrace.is_empty() {
        writeln!(out, "\tStack:")?;
        print_stack(out, &info.stacktrace, "\t\t", false)?;
    }
    Ok(())
}

/// デバッガ状態のコンテキストを表示する
///
/// 現在のスレッド以外でブレークポイントに停止しているスレッドも表示します。
pub fn print_context(out: &mut dyn Write, state: &DebuggerState) -> io::Result<()> {
    let current_id = state.current_thread.as_ref().map(|t| t.id);
    for th in &state.threads {
        if Some(th.id) == current_id {
            continue;
        }
        if th.breakpoint.is_some() {
            print_context_thread(out, th)?;
        }
    }

    let Some(current) = state.current_thread.as_ref() else {
        return writeln!(out, "No current thread available");
    };
    if current.file.is_empty() {
        writeln!(out, "Stopped at: {:#x}", current.pc)?;
        return writeln!(out, "=> no source available");
    }

    print_context_thread(out, current)?;

    if !state.when.is_empty() {
        writeln!(out, "{}", state.when)?;
    }
    Ok(())
}

/// ソースファイルの該当行の前後を表示する
///
/// `stale_since` より新しいファイルなら、実行ファイルと一致しない可能性を警告します。
pub fn print_source(
    out: &mut dyn Write,
    path: &Path,
    line: u32,
    show_arrow: bool,
    stale_since: Option<SystemTime>,
) -> io::Result<()> {
    let file = std::fs::File::open(path)?;
    if let (Some(exe_time), Ok(modified)) = (stale_since, file.metadata().and_then(|m| m.modified()))
    {
        if modified > exe_time {
            writeln!(out, "Warning: listing may not match stale executable")?;
        }
    }

    let start = line.saturating_sub(SOURCE_CONTEXT_LINES).max(1);
    let end = line.saturating_add(SOURCE_CONTEXT_LINES);
    for (idx, text) in BufReader::new(file).lines().enumerate() {
        let Ok(lineno) = u32::try_from(idx + 1) else {
            break;
        };
        if lineno < start {
            continue;
        }
        if lineno > end {
            break;
        }
        let text = text?;
        let marker = match (show_arrow, lineno == line) {
            (false, _) => "",
            (true, true) => "=>",
            (true, false) => "  ",
        };
        writeln!(out, "{}{:4}:\t{}", marker, lineno, text)?;
    }
    Ok(())
}

/// 逆アセンブル結果を表示する
pub fn print_disassembly(out: &mut dyn Write, instructions: &[AsmInstruction]) -> io::Result<()> {
    let mut last_file = String::new();
    let mut last_line = 0;
    for insn in instructions {
        if insn.loc.file != last_file || insn.loc.line != last_line {
            last_file = insn.loc.file.clone();
            last_line = insn.loc.line;
            if let Some(f) = insn.loc.function.as_ref() {
                writeln!(out, "TEXT {}({})", display_function_name(&f.name), shorten_file_path(&last_file))?;
            }
        }
        let marker = if insn.at_pc { "=>" } else { "  " };
        let bp = if insn.breakpoint { "*" } else { " " };
        let bytes: String = insn.bytes.iter().map(|b| format!("{:02x}", b)).collect();
        writeln!(
            out,
            "{}{}\t{}:{}\t{:#x}\t{}\t{}",
            marker,
            bp,
            shorten_file_path(&insn.loc.file),
            insn.loc.line,
            insn.loc.pc,
            bytes,
            insn.text
        )?;
    }
    Ok(())
}

/// 列を揃えて表示する
///
/// 最終列以外を `pad` で埋めて、列幅（最小 `min_width`）＋`padding` に揃えます。
pub fn align_columns(rows: &[Vec<String>], min_width: usize, padding: usize, pad: char) -> String {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![min_width; columns];
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i + 1 < row.len() {
                widths[i] = widths[i].max(cell.chars().count() + padding);
            }
        }
    }

    let mut out = String::new();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            out.push_str(cell);
            if i + 1 < row.len() {
                let fill = widths[i].saturating_sub(cell.chars().count());
                out.extend(std::iter::repeat(pad).take(fill));
            }
        }
        out.push('\n');
    }
    out
}
