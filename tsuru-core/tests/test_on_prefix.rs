//! `on` プレフィックス（ブレークポイントへのアクション束縛）の統合テスト

mod common;

use common::{loc, session, session_with_config};
use tsuru_core::{is_command_not_available, Config};
use tsuru_target::fake::{FakeEvent, FakeTarget};
use tsuru_target::{Stackframe, Variable, LONG_LOAD_CONFIG, SHORT_LOAD_CONFIG};

fn target_with_bp1() -> FakeTarget {
    let target = FakeTarget::new();
    target.add_location("main.go:10", vec![loc(0x100, "/src/main.go", 10, "main.loop")]);
    target
}

fn hit(breakpoint: i64) -> Vec<FakeEvent> {
    vec![FakeEvent::Hit {
        breakpoint,
        goroutine: 1,
        next_in_progress: false,
    }]
}

#[test]
fn test_on_print_reports_once_per_hit() {
    let target = target_with_bp1();
    target.set_value("x", "10");
    let (mut s, out) = session(&target);
    s.call("break bp1 main.go:10").unwrap();
    s.call("on bp1 print x").unwrap();
    assert_eq!(target.breakpoints()[0].variables, vec!["x".to_string()]);
    assert_eq!(target.count_calls("amend 1"), 1);
    out.take();

    target.script(hit(1));
    target.script(hit(1));
    s.call("continue").unwrap();
    s.call("continue").unwrap();

    let text = out.take();
    assert_eq!(text.matches("\tx: 10\n").count(), 2);
    assert!(text.contains("> [bp1] main.loop() /src/main.go:10 (hits goroutine(1):1 total:1) (PC: 0x100)"));
    assert!(text.contains("> [bp1] main.loop() /src/main.go:10 (hits goroutine(1):2 total:2) (PC: 0x100)"));
}

#[test]
fn test_on_failing_command_skips_amend() {
    let target = target_with_bp1();
    let (mut s, _) = session(&target);
    s.call("break bp1 main.go:10").unwrap();

    assert_eq!(s.call("on bp1 print").unwrap_err().to_string(), "not enough arguments");
    assert!(is_command_not_available(&s.call("on bp1 next").unwrap_err()));
    assert!(is_command_not_available(&s.call("on 1 whatis x").unwrap_err()));
    assert_eq!(s.call("on 1 goroutine 3").unwrap_err().to_string(), "too many arguments to goroutine");
    assert_eq!(s.call("on 1 args ^a").unwrap_err().to_string(), "filter not supported on breakpoint");
    assert_eq!(s.call("on bp1").unwrap_err().to_string(), "not enough arguments");
    assert_eq!(target.count_calls("amend 1"), 0);
    assert!(target.breakpoints()[0].variables.is_empty());
}

#[test]
fn test_on_unknown_breakpoint() {
    let target = target_with_bp1();
    let (mut s, _) = session(&target);
    let err = s.call("on 7 print x").unwrap_err();
    assert_eq!(err.to_string(), "no breakpoint with id 7");
}

#[test]
fn test_on_sets_capture_attributes() {
    let target = target_with_bp1();
    let (mut s, out) = session(&target);
    s.call("break main.go:10").unwrap();
    s.call("on 1 stack 4").unwrap();
    s.call("on 1 goroutine").unwrap();
    s.call("on 1 args -v").unwrap();
    s.call("on 1 locals").unwrap();

    let bp = &target.breakpoints()[0];
    assert_eq!(bp.stacktrace, 4);
    assert!(bp.goroutine);
    assert_eq!(bp.load_args, Some(LONG_LOAD_CONFIG));
    assert_eq!(bp.load_locals, Some(SHORT_LOAD_CONFIG));
    assert_eq!(target.count_calls("amend 1"), 4);

    out.take();
    s.call("breakpoints").unwrap();
    assert_eq!(
        out.take(),
        "Breakpoint 1 at 0x100 for main.loop() /src/main.go:10 (0)\n\
         \tstack 4\n\
         \tgoroutine\n\
         \targs -v\n\
         \tlocals\n"
    );
}

#[test]
fn test_hit_renders_bound_information() {
    let target = target_with_bp1();
    target.set_frame_variables(
        vec![Variable {
            name: "n".to_string(),
            value: "3".to_string(),
            ..Default::default()
        }],
        vec![Variable {
            name: "i".to_string(),
            value: "7".to_string(),
            ..Default::default()
        }],
    );
    target.set_stack(vec![Stackframe {
        location: loc(0x100, "/src/main.go", 10, "main.loop"),
        ..Default::default()
    }]);
    let (mut s, out) = session(&target);
    s.call("break main.go:10").unwrap();
    s.call("on 1 args").unwrap();
    s.call("on 1 locals").unwrap();
    s.call("on 1 stack 1").unwrap();
    out.take();

    target.script(hit(1));
    s.call("continue").unwrap();
    let text = out.take();
    // 一行形式の引数は関数名の括弧内に表示される
    assert!(text.contains("> main.loop(3) /src/main.go:10 (hits goroutine(1):1 total:1) (PC: 0x100)\n"));
    assert!(text.contains("\ti: 7\n"));
    assert!(text.contains("\tStack:\n\t\t0  0x0000000000000100 in main.loop\n"));
}

#[test]
fn test_verbose_capture_with_custom_limits() {
    let target = target_with_bp1();
    target.set_frame_variables(
        vec![Variable {
            name: "n".to_string(),
            value: "3".to_string(),
            ..Default::default()
        }],
        vec![Variable {
            name: "i".to_string(),
            value: "7".to_string(),
            ..Default::default()
        }],
    );
    let config = Config {
        max_string_len: Some(100),
        ..Default::default()
    };
    let (mut s, out) = session_with_config(&target, config);
    s.call("break main.go:10").unwrap();
    s.call("on 1 args -v").unwrap();
    s.call("on 1 locals -v").unwrap();
    assert_eq!(target.breakpoints()[0].load_args.map(|c| c.max_string_len), Some(100));
    out.take();

    s.call("breakpoints").unwrap();
    let text = out.take();
    assert!(text.contains("\targs -v\n"));
    assert!(text.contains("\tlocals -v\n"));

    target.script(hit(1));
    s.call("continue").unwrap();
    let text = out.take();
    assert!(text.contains("> main.loop() /src/main.go:10 (hits goroutine(1):1 total:1) (PC: 0x100)\n"));
    assert!(text.contains("\tn: 3\n"));
    assert!(text.contains("\ti: 7\n"));
}

#[test]
fn test_print_outside_on_evaluates_immediately() {
    let target = target_with_bp1();
    target.set_value("x", "10");
    let (mut s, out) = session(&target);
    s.call("frame 1 print x").unwrap();
    assert_eq!(out.take(), "10\n");
    assert_eq!(target.calls(), vec!["eval x"]);
}
