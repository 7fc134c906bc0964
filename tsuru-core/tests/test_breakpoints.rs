//! ブレークポイント管理の統合テスト

mod common;

use common::{loc, session};
use tsuru_core::{resolve_breakpoint, CommandError};
use tsuru_target::fake::FakeTarget;
use tsuru_target::{Breakpoint, TargetError};

fn target_with_locations() -> FakeTarget {
    let target = FakeTarget::new();
    target.add_location("main.go:10", vec![loc(0x100, "/src/main.go", 10, "main.main")]);
    target.add_location(
        "worker.go:5",
        vec![
            loc(0x200, "/src/worker.go", 5, "main.worker"),
            loc(0x300, "/src/worker.go", 5, "main.worker.func1"),
            loc(0x400, "/src/worker.go", 5, "main.worker.func2"),
        ],
    );
    target
}

#[test]
fn test_break_creates_one_breakpoint_per_address() {
    let target = target_with_locations();
    let (mut s, out) = session(&target);

    s.call("break worker.go:5").unwrap();
    let bps = target.breakpoints();
    assert_eq!(bps.len(), 3);
    assert_eq!(
        bps.iter().map(|b| b.addr).collect::<Vec<_>>(),
        vec![0x200, 0x300, 0x400]
    );
    assert_eq!(
        out.take(),
        "Breakpoint 1 set at 0x200 for main.worker() /src/worker.go:5\n\
         Breakpoint 2 set at 0x300 for main.worker.func1() /src/worker.go:5\n\
         Breakpoint 3 set at 0x400 for main.worker.func2() /src/worker.go:5\n"
    );

    // 個別に削除できる
    s.call("clear 2").unwrap();
    assert_eq!(out.take(), "Breakpoint 2 cleared at 0x300 for main.worker.func1() /src/worker.go:5\n");
    assert_eq!(
        target.breakpoints().iter().map(|b| b.id).collect::<Vec<_>>(),
        vec![1, 3]
    );
}

#[test]
fn test_named_breakpoint() {
    let target = target_with_locations();
    let (mut s, out) = session(&target);
    s.call("b entry main.go:10").unwrap();
    assert_eq!(target.breakpoints()[0].name, "entry");
    assert_eq!(out.take(), "Breakpoint entry set at 0x100 for main.main() /src/main.go:10\n");

    s.call("clear entry").unwrap();
    assert!(target.breakpoints().is_empty());
}

#[test]
fn test_named_breakpoint_on_several_addresses_warns() {
    let target = target_with_locations();
    let (mut s, out) = session(&target);
    s.call("break w worker.go:5").unwrap();
    assert!(target.breakpoints().iter().all(|b| b.name == "w"));
    assert!(out.take().starts_with("Warning: worker.go:5 resolves to 3 addresses"));
}

#[test]
fn test_name_fallback_to_whole_locspec() {
    let target = FakeTarget::new();
    target.add_location("helper extra", vec![loc(0x500, "/src/main.go", 10, "main.helper")]);
    let (mut s, _) = session(&target);

    // "helper" を名前として解釈すると "extra" が解決できないので、全体をロケーションとして扱う
    s.call("break helper extra").unwrap();
    let bps = target.breakpoints();
    assert_eq!(bps.len(), 1);
    assert_eq!(bps[0].name, "");
    assert_eq!(bps[0].addr, 0x500);
}

#[test]
fn test_name_fallback_to_empty_location_names_whole_locspec() {
    let target = FakeTarget::new();
    target.add_location("helper extra", vec![]);
    let (mut s, _) = session(&target);
    let err = s.call("break helper extra").unwrap_err();
    assert_eq!(
        err.downcast_ref::<TargetError>(),
        Some(&TargetError::LocationNotFound {
            locspec: "helper extra".to_string()
        })
    );
    assert!(target.breakpoints().is_empty());
}

#[test]
fn test_name_fallback_reports_first_error() {
    let target = FakeTarget::new();
    let (mut s, _) = session(&target);
    let err = s.call("break entry nowhere.go:1").unwrap_err();
    assert_eq!(
        err.downcast_ref::<TargetError>(),
        Some(&TargetError::LocationNotFound {
            locspec: "nowhere.go:1".to_string()
        })
    );
    assert!(target.breakpoints().is_empty());
}

#[test]
fn test_break_requires_location() {
    let target = FakeTarget::new();
    let (mut s, _) = session(&target);
    let err = s.call("break").unwrap_err();
    assert_eq!(err.to_string(), "address required");
}

#[test]
fn test_trace_sets_tracepoint() {
    let target = target_with_locations();
    let (mut s, out) = session(&target);
    s.call("trace main.go:10").unwrap();
    assert!(target.breakpoints()[0].tracepoint);
    assert!(out.take().starts_with("Tracepoint 1 set at 0x100"));
}

#[test]
fn test_clear_all_filtered_skips_internal_breakpoints() {
    let target = target_with_locations();
    target.insert_breakpoint(Breakpoint {
        id: -1,
        addr: 0x100,
        ..Default::default()
    });
    let (mut s, out) = session(&target);
    s.call("break worker.go:5").unwrap();
    out.take();

    // 一致するのは内部ブレークポイントだけなので何も消えない
    s.call("clearall main.go:10").unwrap();
    assert_eq!(out.take(), "");
    assert_eq!(target.breakpoints().len(), 4);

    s.call("clearall worker.go:5").unwrap();
    assert_eq!(out.take().lines().count(), 3);
    assert_eq!(
        target.breakpoints().iter().map(|b| b.id).collect::<Vec<_>>(),
        vec![-1]
    );

    s.call("clearall").unwrap();
    assert_eq!(target.breakpoints().len(), 1);
}

#[test]
fn test_clear_all_reports_failures_and_continues() {
    let target = target_with_locations();
    let (mut s, out) = session(&target);
    s.call("break worker.go:5").unwrap();
    out.take();
    target.fail_clear(2);

    s.call("clear-all").unwrap();
    let text = out.take();
    assert!(text.contains(
        "Couldn't delete breakpoint 2 at 0x300 for main.worker.func1() /src/worker.go:5: could not clear breakpoint 2"
    ));
    assert!(!text.contains("Breakpoint 2 cleared"));
    assert!(text.contains("Breakpoint 3 cleared"));
    assert_eq!(
        target.breakpoints().iter().map(|b| b.id).collect::<Vec<_>>(),
        vec![2]
    );
}

#[test]
fn test_condition_round_trip() {
    let target = target_with_locations();
    let (mut s, out) = session(&target);
    s.call("break main.go:10").unwrap();
    s.call("cond 1 x > 3").unwrap();
    assert_eq!(target.breakpoints()[0].cond, "x > 3");
    assert!(target.calls().contains(&"amend 1".to_string()));

    out.take();
    s.call("breakpoints").unwrap();
    assert_eq!(
        out.take(),
        "Breakpoint 1 at 0x100 for main.main() /src/main.go:10 (0)\n\tcond x > 3\n"
    );
}

#[test]
fn test_condition_errors() {
    let target = target_with_locations();
    let (mut s, _) = session(&target);
    s.call("break main.go:10").unwrap();

    assert_eq!(s.call("condition 1").unwrap_err().to_string(), "not enough arguments");
    let err = s.call("condition 9 x").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<TargetError>(),
        Some(TargetError::BreakpointNotFound { .. })
    ));
    assert_eq!(target.count_calls("amend 1"), 0);
}

#[test]
fn test_resolve_distinguishes_malformed_from_missing() {
    let mut target = target_with_locations();
    let err = resolve_breakpoint(&mut target, "bad-name").unwrap_err();
    assert_eq!(
        err.downcast_ref::<CommandError>(),
        Some(&CommandError::InvalidBreakpointRef("bad-name".to_string()))
    );
    let err = resolve_breakpoint(&mut target, "missing").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<TargetError>(),
        Some(TargetError::BreakpointNotFound { .. })
    ));
    assert!(resolve_breakpoint(&mut target, " ").is_err());
}
