mod common;
use common::*;
use pretty_assertions::assert_eq;

#[test]
fn test_let_and_print() {
    assert_eq!(run("LET X = 2 + 3\nPRINT X"), "5\n");
    assert_eq!(run("X = 7 * 6\nY = X - 2\nPRINT Y"), "40\n");
}

#[test]
fn test_print_separators() {
    assert_eq!(run("PRINT 1; 2; 3"), "123\n");
    assert_eq!(run("PRINT 1, 2"), "1\t2\n");
    assert_eq!(run("PRINT 1;\nPRINT 2"), "12\n");
    assert_eq!(run("PRINT 1,\nPRINT"), "1\t\n");
    assert_eq!(run("PRINT"), "\n");
}

#[test]
fn test_print_negative() {
    assert_eq!(run("PRINT -42"), "-42\n");
    assert_eq!(run("X = 3\nPRINT X - 10"), "-7\n");
    assert_eq!(run("X = -2147483647\nPRINT X - 1"), "-2147483648\n");
}

#[test]
fn test_strings() {
    assert_eq!(run("PRINT \"HELLO\"; \" \"; \"WORLD\""), "HELLO WORLD\n");
    assert_eq!(run("S = \"ABC\"\nPRINT peekByte(S + 1)"), "66\n");
    assert_eq!(run("S = \"X\"\nprintStr(S)\nPRINT"), "X\n");
}

#[test]
fn test_for_next() {
    assert_eq!(run("FOR I = 1 TO 3\nPRINT I\nNEXT I"), "1\n2\n3\n");
    assert_eq!(run("FOR I = 10 TO 1 STEP -3\nPRINT I;\nNEXT I\nPRINT"), "10741\n");
    assert_eq!(run("FOR I = 5 TO 1\nPRINT I\nNEXT I\nPRINT I"), "5\n");
}

#[test]
fn test_nested_for() {
    let source = r#"
FOR I = 1 TO 2
    FOR J = 1 TO 3
        PRINT I * J;
    NEXT J
    PRINT
NEXT I
"#;
    assert_eq!(run(source), "123\n246\n");
}

#[test]
fn test_if_else() {
    let source = r#"
FOR I = 1 TO 4
    IF I = 1 THEN
        PRINT "one"
    ELSE IF I = 2 THEN
        PRINT "two"
    ELSE IF I = 3 THEN
        PRINT "three"
    ELSE
        PRINT "many"
    END IF
NEXT I
"#;
    assert_eq!(run(source), "one\ntwo\nthree\nmany\n");
}

#[test]
fn test_single_line_if() {
    assert_eq!(run("IF 1 THEN PRINT \"yes\""), "yes\n");
    assert_eq!(run("IF 0 THEN PRINT \"yes\"\nPRINT \"done\""), "done\n");
}

#[test]
fn test_do_loops() {
    assert_eq!(run("I = 0\nDO WHILE I < 3\nPRINT I;\nI = I + 1\nLOOP\nPRINT"), "012\n");
    assert_eq!(run("I = 0\nDO UNTIL I = 3\nPRINT I;\nI = I + 1\nLOOP\nPRINT"), "012\n");
    assert_eq!(run("I = 5\nDO\nPRINT I;\nI = I + 1\nLOOP WHILE I < 3\nPRINT"), "5\n");
    assert_eq!(run("I = 0\nDO\nI = I + 2\nLOOP UNTIL I >= 7\nPRINT I"), "8\n");
    assert_eq!(run("I = 5\nDO WHILE I < 3\nPRINT I\nLOOP\nPRINT \"skip\""), "skip\n");
}

#[test]
fn test_endless_loop_with_end() {
    let source = r#"
I = 0
DO
    I = I + 1
    IF I = 4 THEN END
LOOP
"#;
    let mut r = runtime(source);
    assert_eq!(exec(&mut r), "");
    assert!(r.is_stopped());
}

#[test]
fn test_arrays() {
    let source = r#"
DIM a[5]
FOR i = 0 TO 4
    a[i] = i * i
NEXT i
FOR i = 4 TO 0 STEP -1
    PRINT a[i];
NEXT i
PRINT
"#;
    assert_eq!(run(source), "169410\n");
}

#[test]
fn test_logical_operators() {
    assert_eq!(run("A = 0\nB = 2\nPRINT A OR B"), "2\n");
    assert_eq!(run("A = 3\nB = 0\nPRINT A AND B"), "0\n");
    assert_eq!(run("A = 3\nB = 4\nPRINT A AND B"), "4\n");
    assert_eq!(run("PRINT 0 OR 0 OR 5"), "5\n");
}

#[test]
fn test_short_circuit_skips_call() {
    let source = r#"
FUNCTION noisy()
    PRINT "called"
    RETURN 1
END FUNCTION
A = 0
IF A AND noisy() THEN PRINT "no"
A = 1
IF A OR noisy() THEN PRINT "yes"
"#;
    assert_eq!(run(source), "yes\n");
}

#[test]
fn test_arithmetic() {
    assert_eq!(run("A = 17\nPRINT A / 5; \" \"; A MOD 5"), "3 2\n");
    assert_eq!(run("A = 0\nPRINT 10 / A"), "0\n");
    assert_eq!(run("A = 2147483647\nPRINT A + 1"), "-2147483648\n");
    assert_eq!(run("A = 1\nPRINT A < 2; A = 1; A <> 1"), "110\n");
}

#[test]
fn test_constant_folding_runs() {
    assert_eq!(run("PRINT (1 + 2) * 3 - 4 / 2"), "7\n");
    assert_eq!(run("DEF N = 3 * 4\nPRINT N + 1"), "13\n");
}

#[test]
fn test_asm_block() {
    let source = r#"
ASM
SLIT 65
TRAP 1
END ASM
PRINT
"#;
    assert_eq!(run(source), "A\n");
}

#[test]
fn test_comments() {
    let source = r#"
REM counting
X = 1 ' start
IF X THEN ' block
    PRINT "in" REM inside
END IF
' done
PRINT X
"#;
    assert_eq!(run(source), "in\n1\n");
}
