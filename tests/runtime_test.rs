mod common;
use basic::lang::ErrorCode;
use basic::mach::Event;
use common::*;
use pretty_assertions::assert_eq;

#[test]
fn test_get_char() {
    let source = r#"
c = getChar()
PRINT c
"#;
    let mut r = runtime(source);
    assert_eq!(exec_with_input(&mut r, &["A"]), "65\n");
}

#[test]
fn test_echo_until_end_of_input() {
    let source = r#"
DIM n
DO
    c = getChar()
    IF c < 0 THEN END
    IF c <> 10 THEN
        putChar(c + 1)
        n = n + 1
    END IF
LOOP
"#;
    let mut r = runtime(source);
    assert_eq!(exec_with_input(&mut r, &["HAL", "abc"]), "IBMbcd");
}

#[test]
fn test_waits_for_input() {
    let mut r = runtime("PRINT \"name\";\nc = getChar()\nPRINT c");
    assert_eq!(r.execute(10_000), Event::Print("name".to_string()));
    assert_eq!(r.execute(10_000), Event::Input);
    assert_eq!(r.execute(10_000), Event::Input);
    r.enter("");
    assert_eq!(r.execute(10_000), Event::Print("10\n".to_string()));
    assert_eq!(r.execute(10_000), Event::Stopped);
}

#[test]
fn test_fault_stops_program() {
    let source = r#"
DIM a[2]
PRINT "before"
a[100000] = 1
PRINT "after"
"#;
    let mut r = runtime(source);
    assert_eq!(r.execute(10_000), Event::Print("before\n".to_string()));
    match r.execute(10_000) {
        Event::Errors(e) => assert!(e.is(ErrorCode::RuntimeFault)),
        event => panic!("{:?}", event),
    }
    assert_eq!(r.execute(10_000), Event::Stopped);
    assert!(r.is_stopped());
}

#[test]
fn test_interrupt() {
    let mut r = runtime("DO\nLOOP");
    assert_eq!(r.execute(1000), Event::Running);
    r.interrupt();
    match r.execute(1000) {
        Event::Errors(e) => assert!(e.is(ErrorCode::Break)),
        event => panic!("{:?}", event),
    }
    assert_eq!(r.execute(1000), Event::Stopped);
}

#[test]
fn test_restart_resets_memory() {
    let source = r#"
DIM total
total = total + 1
PRINT total
"#;
    let mut r = runtime(source);
    assert_eq!(exec(&mut r), "1\n");
    r.restart();
    assert_eq!(exec(&mut r), "1\n");
}

#[test]
fn test_long_output_is_chunked() {
    let mut r = runtime("FOR i = 1 TO 300\nPRINT \"x\";\nNEXT i\nPRINT");
    let mut chunks = vec![];
    loop {
        match r.execute(100_000) {
            Event::Print(s) => chunks.push(s),
            Event::Stopped => break,
            Event::Running => {}
            event => panic!("{:?}", event),
        }
    }
    assert!(chunks.len() >= 2);
    assert!(chunks.iter().all(|s| s.len() <= 256));
    assert_eq!(chunks.concat(), format!("{}\n", "x".repeat(300)));
}
