//! ディスパッチ・プレフィックス・コマンドファイルの統合テスト

mod common;

use common::{loc, session, session_with_config, write_script};
use std::collections::BTreeMap;
use std::io::Write;
use tsuru_core::errors::ERR_FRAME_PREFIX;
use tsuru_core::{is_command_not_available, is_exit_request, CallContext, CommandError, Config, Session};
use tsuru_target::fake::FakeTarget;
use tsuru_target::Goroutine;

fn custom_continue(s: &mut Session, _: &mut CallContext, args: &str) -> tsuru_core::Result<()> {
    writeln!(s.out(), "custom continue [{}]", args)?;
    Ok(())
}

#[test]
fn test_unknown_command_is_not_available() {
    let target = FakeTarget::new();
    let (mut s, _) = session(&target);
    let err = s.call("frobnicate").unwrap_err();
    assert!(is_command_not_available(&err));
    assert_eq!(err.to_string(), "command not available");
}

#[test]
fn test_empty_line_repeats_last_command() {
    let target = FakeTarget::new();
    let (mut s, _) = session(&target);

    // 直前のコマンドが無ければ何もしない
    s.call("").unwrap();
    assert!(target.calls().is_empty());

    s.call("next").unwrap();
    s.call("").unwrap();
    s.call("   ").unwrap();
    assert_eq!(target.count_calls("next"), 3);
}

#[test]
fn test_scope_prefix_rejects_ineligible_command() {
    let target = FakeTarget::new();
    let (mut s, _) = session(&target);

    let err = s.call("goroutine 1 continue").unwrap_err();
    assert!(is_command_not_available(&err));
    let err = s.call("frame 0 breakpoints").unwrap_err();
    assert!(is_command_not_available(&err));
    assert_eq!(target.count_calls("continue"), 0);
}

#[test]
fn test_frame_prefix_rejected_for_execution() {
    let target = FakeTarget::new();
    let (mut s, _) = session(&target);
    let err = s.call("frame 1 next").unwrap_err();
    assert_eq!(
        err.downcast_ref::<CommandError>(),
        Some(&CommandError::usage(ERR_FRAME_PREFIX))
    );
    assert_eq!(target.count_calls("next"), 0);
}

#[test]
fn test_goroutine_prefix_switches_before_step() {
    let target = FakeTarget::new();
    target.add_goroutine(Goroutine {
        id: 2,
        ..Default::default()
    });
    let (mut s, _) = session(&target);
    s.call("goroutine 2 step").unwrap();
    assert_eq!(target.calls(), vec!["switch-goroutine 2", "step"]);
}

#[test]
fn test_goroutine_prefix_requires_command() {
    let target = FakeTarget::new();
    let (mut s, _) = session(&target);
    let err = s.call("frame 1 goroutine 2").unwrap_err();
    assert_eq!(err.to_string(), "no command passed to goroutine");

    let err = s.call("frame 1").unwrap_err();
    assert_eq!(err.to_string(), "not enough arguments");

    let err = s.call("goroutine 1 goroutine 2 print x").unwrap_err();
    assert_eq!(err.to_string(), "conflicting goroutine prefixes");
}

#[test]
fn test_register_replaces_existing_handler() {
    let target = FakeTarget::new();
    let (mut s, out) = session(&target);
    s.register("c", custom_continue, "unused help");
    s.call("continue now").unwrap();
    assert_eq!(out.take(), "custom continue [now]\n");
    assert_eq!(target.count_calls("continue"), 0);
    assert_eq!(
        s.commands().get("continue").unwrap().help(),
        "Run until breakpoint or program termination."
    );
}

#[test]
fn test_configured_aliases_are_merged() {
    let target = FakeTarget::new();
    let mut aliases = BTreeMap::new();
    aliases.insert("next".to_string(), vec!["nx".to_string()]);
    let config = Config {
        aliases,
        ..Default::default()
    };
    let (mut s, _) = session_with_config(&target, config);
    s.call("nx").unwrap();
    assert_eq!(target.count_calls("next"), 1);
}

#[test]
fn test_config_alias_command() {
    let target = FakeTarget::new();
    let (mut s, _) = session(&target);

    s.call("config alias stepout so").unwrap();
    s.call("so").unwrap();
    assert_eq!(target.count_calls("stepout"), 1);
    assert_eq!(s.config().aliases["stepout"], vec!["so".to_string()]);

    // 既存の別名とは衝突させない
    assert!(s.call("config alias next c").is_err());

    s.call("config alias so").unwrap();
    assert!(is_command_not_available(&s.call("so").unwrap_err()));
    assert!(s.config().aliases.is_empty());
}

#[test]
fn test_exit_request() {
    let target = FakeTarget::new();
    let (mut s, _) = session(&target);
    for alias in ["exit", "quit", "q"] {
        assert!(is_exit_request(&s.call(alias).unwrap_err()));
    }
}

#[test]
fn test_help() {
    let target = FakeTarget::new();
    let (mut s, out) = session(&target);
    s.call("help").unwrap();
    let text = out.take();
    assert!(text.starts_with("The following commands are available:\n"));
    assert!(text.contains("continue (alias: c) "));
    assert!(text.contains("exit (alias: quit | q) "));
    assert!(!text.contains("rewind"));

    s.call("help bt").unwrap();
    assert!(out.take().starts_with("Print stack trace."));
    assert!(is_command_not_available(&s.call("help nope").unwrap_err()));
}

#[test]
fn test_source_file_reports_failures_and_continues() {
    let target = FakeTarget::new();
    let (mut s, out) = session(&target);
    let path = write_script(
        "dispatch-script.txt",
        "# setup\n\nnext\nbogus\nstepout\n",
    );
    s.call(&format!("source {}", path.display())).unwrap();
    assert_eq!(target.calls(), vec!["next", "stepout"]);
    assert!(out
        .take()
        .contains(&format!("{}:4: command not available", path.display())));
}

#[test]
fn test_source_file_survives_invalid_utf8_line() {
    let target = FakeTarget::new();
    target.add_location("main.go:10", vec![loc(0x100, "/src/main.go", 10, "main.main")]);
    let (mut s, out) = session(&target);
    let path = write_script(
        "dispatch-bytes.txt",
        b"help\n\xff\xfe bogus\nbreak main.go:10\n".as_slice(),
    );
    s.call(&format!("source {}", path.display())).unwrap();
    assert_eq!(target.breakpoints().len(), 1);
    assert!(out
        .take()
        .contains(&format!("{}:2: command not available", path.display())));
}

#[test]
fn test_source_file_stops_on_exit() {
    let target = FakeTarget::new();
    let (mut s, _) = session(&target);
    let path = write_script("dispatch-exit.txt", "next\nexit\nnext\n");
    let err = s.execute_file(&path).unwrap_err();
    assert!(is_exit_request(&err));
    assert_eq!(target.count_calls("next"), 1);
}
