mod common;
use basic::lang::ErrorCode;
use basic::mach::{compile, compile_with, Config, Listing, Opcode, Program};
use common::*;
use pretty_assertions::assert_eq;
use std::collections::HashSet;

fn error(source: &str) -> basic::lang::Error {
    init_test_logging();
    match compile(source) {
        Ok(_) => panic!("compiled: {}", source),
        Err(error) => error,
    }
}

#[test]
fn test_division_by_zero_literal() {
    let e = error("PRINT 1 / 0");
    assert!(e.is(ErrorCode::DivisionByZero));
    assert_eq!(e.line_number(), Some(1));
}

#[test]
fn test_duplicate_definition() {
    let e = error("FUNCTION f()\nEND FUNCTION\nFUNCTION f()\nEND FUNCTION");
    assert!(e.is(ErrorCode::DuplicateDefinition));
    assert_eq!(e.line_number(), Some(3));
    let e = error("DIM a[2]\nDIM a[3]");
    assert!(e.is(ErrorCode::DuplicateDefinition));
    let e = error("FUNCTION f(x)\nDIM x\nEND FUNCTION");
    assert!(e.is(ErrorCode::DuplicateDefinition));
}

#[test]
fn test_undefined_function() {
    let e = error("PRINT nothing(1)");
    assert!(e.is(ErrorCode::UndefinedFunction));
}

#[test]
fn test_block_mismatch() {
    assert!(error("NEXT I").is(ErrorCode::NextWithoutFor));
    assert!(error("FOR I = 1 TO 2\nPRINT I").is(ErrorCode::ForWithoutNext));
    assert!(error("DO\nPRINT 1").is(ErrorCode::DoWithoutLoop));
    assert!(error("LOOP").is(ErrorCode::LoopWithoutDo));
    assert!(error("IF 1 THEN\nPRINT 1").is(ErrorCode::IfWithoutEndIf));
    assert!(error("END IF").is(ErrorCode::EndIfWithoutIf));
    assert!(error("ELSE").is(ErrorCode::ElseWithoutIf));
    assert!(error("FUNCTION f()").is(ErrorCode::FunctionWithoutEnd));
    assert!(error("END FUNCTION").is(ErrorCode::EndWithoutFunction));
}

#[test]
fn test_invalid_assignment() {
    assert!(error("DEF N = 1\nN = 2").is(ErrorCode::InvalidAssignment));
    assert!(error("FUNCTION f()\nEND FUNCTION\nf = 1").is(ErrorCode::InvalidAssignment));
    assert!(error("3 = 4").is(ErrorCode::SyntaxError));
}

#[test]
fn test_nesting_limit() {
    let mut source = String::new();
    for _ in 0..11 {
        source.push_str("DO\n");
    }
    for _ in 0..11 {
        source.push_str("LOOP\n");
    }
    assert!(error(&source).is(ErrorCode::TooDeeplyNested));
}

#[test]
fn test_out_of_memory() {
    let config = Config {
        arena_size: 8192,
        ..Config::default()
    };
    let e = compile_with(&config, "DIM a[4000]").unwrap_err();
    assert!(e.is(ErrorCode::OutOfMemory));
}

#[test]
fn test_folding_leaves_one_literal() {
    let program = compile("X = (2 + 3) * 4").unwrap();
    let listing = Listing::new(&program);
    let main = program.code().last().unwrap();
    let ops: Vec<Opcode> = listing
        .instructions(main.start, main.end)
        .iter()
        .map(|i| i.opcode)
        .collect();
    assert!(!ops.contains(&Opcode::Add));
    assert!(!ops.contains(&Opcode::Mul));
    assert!(listing.to_string().contains("SLIT 20"));
}

fn starts(program: &Program) -> HashSet<usize> {
    Listing::new(program).all().iter().map(|i| i.addr).collect()
}

#[test]
fn test_branches_land_on_instructions() {
    let source = r#"
FUNCTION collatz(n)
    DIM steps
    DO WHILE n <> 1
        IF n MOD 2 = 0 THEN
            n = n / 2
        ELSE
            n = 3 * n + 1
        END IF
        steps = steps + 1
    LOOP
    RETURN steps
END FUNCTION
FOR i = 1 TO 5
    IF i > 2 AND collatz(i) > 2 OR i = 1 THEN PRINT i
NEXT i
"#;
    let program = compile(source).unwrap();
    let starts = starts(&program);
    for inst in Listing::new(&program).all() {
        if let Some(target) = inst.target() {
            assert!(starts.contains(&target), "{:?} -> {:04X}", inst, target);
        }
    }
}

#[test]
fn test_forward_calls_are_patched() {
    let source = r#"
PRINT later(1)
FUNCTION later(x)
    RETURN x + evenlater(x)
END FUNCTION
FUNCTION evenlater(x)
    RETURN x
END FUNCTION
"#;
    let program = compile(source).unwrap();
    let entries: HashSet<usize> = program.code().iter().map(|r| r.start).collect();
    let all = Listing::new(&program).all();
    let mut calls = 0;
    for pair in all.windows(2) {
        if pair[1].opcode == Opcode::Pushj {
            assert_eq!(pair[0].opcode, Opcode::Lit);
            let callee = pair[0].operand.unwrap() as usize;
            assert!(entries.contains(&callee), "call to {:04X}", callee);
            calls += 1;
        }
    }
    assert!(calls > 0);
    assert_eq!(run(source), "2\n");
}
