//! 実行制御（ステップ完了プロトコル・エラー処理・再起動）の統合テスト

mod common;

use common::{loc, session, write_source};
use tsuru_core::is_command_not_available;
use tsuru_target::fake::{FakeEvent, FakeTarget};
use tsuru_target::{is_process_exited, Breakpoint, DiscardedBreakpoint};

#[test]
fn test_next_interrupted_by_breakpoint_continues_to_completion() {
    let source = write_source("exec_next.go", 20);
    let file = source.to_string_lossy().to_string();
    let target = FakeTarget::new();
    target.script(vec![FakeEvent::Stop {
        location: loc(0x2000, &file, 15, "main.helper"),
        next_in_progress: true,
    }]);
    target.script(vec![FakeEvent::Stop {
        location: loc(0x1010, &file, 7, "main.main"),
        next_in_progress: false,
    }]);
    let (mut s, out) = session(&target);

    s.call("next").unwrap();

    assert_eq!(target.calls(), vec!["next", "continue"]);
    let text = out.take();
    assert!(text.contains("\tbreakpoint hit during next, continuing...\n"));
    let hit = text.find("breakpoint hit during next").unwrap();
    // ソースは完了時の位置だけを表示する
    assert!(text[hit..].contains("=>   7:\tline 7\n"));
    assert!(!text.contains("=>  15:"));
    assert!(text.contains("    2:\tline 2\n"));
    assert!(!text.contains("    1:\tline 1\n"));
}

#[test]
fn test_step_without_interruption_issues_no_continue() {
    let target = FakeTarget::new();
    let (mut s, out) = session(&target);
    s.call("step").unwrap();
    s.call("stepout").unwrap();
    assert_eq!(target.calls(), vec!["step", "stepout"]);
    assert!(!out.take().contains("continuing"));
}

#[test]
fn test_every_state_is_rendered() {
    let target = FakeTarget::new();
    target.script(vec![
        FakeEvent::Stop {
            location: loc(0x10, "/src/a.go", 1, "main.first"),
            next_in_progress: false,
        },
        FakeEvent::Stop {
            location: loc(0x20, "/src/a.go", 2, "main.second"),
            next_in_progress: false,
        },
    ]);
    let (mut s, out) = session(&target);
    s.call("continue").unwrap();
    let text = out.take();
    let first = text.find("> main.first() /src/a.go:1 (PC: 0x10)").unwrap();
    let second = text.find("> main.second() /src/a.go:2 (PC: 0x20)").unwrap();
    assert!(first < second);
}

#[test]
fn test_error_state_aborts_and_drains_stream() {
    let target = FakeTarget::new();
    target.script(vec![
        FakeEvent::Error("could not single step".to_string()),
        FakeEvent::Stop {
            location: loc(0x30, "/src/a.go", 3, "main.after"),
            next_in_progress: false,
        },
    ]);
    let (mut s, out) = session(&target);
    let err = s.call("step").unwrap_err();
    assert_eq!(err.to_string(), "could not single step");
    assert!(!out.take().contains("main.after"));
    assert_eq!(target.count_calls("continue"), 0);
}

#[test]
fn test_rewind_error_aborts_and_shows_source() {
    let source = write_source("exec_rewind.go", 12);
    let target = FakeTarget::recording();
    target.set_position(loc(0x1000, &source.to_string_lossy(), 6, "main.main"));
    target.script(vec![FakeEvent::Error("could not rewind".to_string())]);
    let (mut s, out) = session(&target);

    let err = s.call("rewind").unwrap_err();
    assert_eq!(err.to_string(), "could not rewind");
    assert_eq!(target.count_calls("rewind"), 1);
    assert_eq!(target.count_calls("continue"), 0);
    let text = out.take();
    assert!(!text.contains("> main.main()"));
    assert!(text.contains("=>   6:\tline 6\n"));
}

#[test]
fn test_process_exit_is_distinct() {
    let target = FakeTarget::new();
    target.script(vec![FakeEvent::Exit(3)]);
    let (mut s, _) = session(&target);
    let err = s.call("continue").unwrap_err();
    assert!(is_process_exited(&err));
    assert_eq!(err.to_string(), "Process 4242 has exited with status 3");

    // 終了後の操作もプロセス終了として報告される
    let err = s.call("next").unwrap_err();
    assert!(is_process_exited(&err));
    assert_eq!(err.to_string(), "Process 4242 has exited with status 0");
}

#[test]
fn test_step_instruction_under_goroutine_prefix() {
    let target = FakeTarget::new();
    let (mut s, _) = session(&target);
    s.call("goroutine 1 si").unwrap();
    assert_eq!(target.calls(), vec!["switch-goroutine 1", "step-instruction"]);
}

#[test]
fn test_recording_shows_when_label() {
    let target = FakeTarget::recording();
    let (mut s, out) = session(&target);
    s.call("continue").unwrap();
    assert!(out.take().contains("Current event: "));
}

#[test]
fn test_rewind_only_for_recordings() {
    let live = FakeTarget::new();
    let (mut s, _) = session(&live);
    assert!(is_command_not_available(&s.call("rewind").unwrap_err()));

    let recording = FakeTarget::recording();
    let (mut s, out) = session(&recording);
    s.call("rw").unwrap();
    assert_eq!(recording.calls(), vec!["rewind"]);
    assert!(out.take().contains("> main.main() main.go:1 (PC: 0x1000)"));
}

#[test]
fn test_restart_reports_discarded_breakpoints_and_pid() {
    let target = FakeTarget::new();
    target.insert_breakpoint(Breakpoint {
        id: 4,
        addr: 0x1234,
        ..Default::default()
    });
    target.discard_on_restart(vec![DiscardedBreakpoint {
        breakpoint: Breakpoint {
            id: 4,
            ..Default::default()
        },
        reason: "location not found".to_string(),
    }]);
    let (mut s, out) = session(&target);
    s.call("restart").unwrap();
    assert_eq!(
        out.take(),
        "Breakpoint 4 discarded because location not found\nProcess restarted with PID 4243\n"
    );
    assert!(target.breakpoints().is_empty());
}

#[test]
fn test_restart_recording_redisplays_state() {
    let target = FakeTarget::recording();
    let (mut s, out) = session(&target);
    s.call("restart 120").unwrap();
    assert_eq!(target.calls(), vec!["restart 120"]);
    assert!(out.take().starts_with("> main.main() main.go:1 (PC: 0x1000)\n"));
}
