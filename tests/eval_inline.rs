use std::process::Command;

use cairn::{eval_to_string, Error, Runtime};

fn run(src: &str) -> String {
    let mut rt = Runtime::new();
    match eval_to_string(&mut rt, src) {
        Ok(s) => s,
        Err(e) => panic!("eval of {src:?} failed: {e}"),
    }
}

fn run_err(src: &str) -> Error {
    let mut rt = Runtime::new();
    match eval_to_string(&mut rt, src) {
        Ok(s) => panic!("eval of {src:?} unexpectedly succeeded with {s:?}"),
        Err(e) => e,
    }
}

// --- Arithmetic and the numeric tower ---

#[test]
fn basic_arithmetic() {
    assert_eq!(run("3 4 +"), "7");
    assert_eq!(run("2 10 ^"), "1024");
    assert_eq!(run("10 3 %"), "1");
}

#[test]
fn subtraction_and_division_pop_order() {
    // a b OP computes a OP b.
    assert_eq!(run("5 3 -"), "2");
    assert_eq!(run("7 2 /"), "3.5");
    assert_eq!(run("10 4 .%"), "2");
    assert_eq!(run("-7 2 .%"), "-4");
}

#[test]
fn integer_division_is_exact_when_possible() {
    assert_eq!(run("6 3 /"), "2");
    assert_eq!(run("1 2 /"), "0.5");
}

#[test]
fn overflow_promotes_to_bignum() {
    assert_eq!(run("9223372036854775807 1 +"), "9223372036854775808");
}

#[test]
fn rational_arithmetic() {
    assert_eq!(run(":1r2 :1r3 +"), ":5r6");
    assert_eq!(run(":1r2 2 *"), ":1r1");
}

#[test]
fn complex_numbers() {
    assert_eq!(run("3 4 MI"), ":3i4");
    assert_eq!(run(":1i2 :1i-2 +"), ":2i0");
}

#[test]
fn scientific_shorthand() {
    assert_eq!(run("3 E"), "1000");
}

#[test]
fn math_namespace() {
    assert_eq!(run("0 Ms"), "0");
    assert_eq!(run("5 M!"), "120");
    assert_eq!(run("100 ML"), "2");
    assert_eq!(run("\"2.5\" Md"), "2.5");
    assert_eq!(run("10 Mp"), "[2 3 5 7]");
}

// --- Stack shuffling ---

#[test]
fn stack_ops() {
    assert_eq!(run("1 2 \\"), "2 1");
    assert_eq!(run("1 2 ;"), "1");
    assert_eq!(run("5 $ +"), "10");
    assert_eq!(run("1 2 3 @"), "2 3 1");
    assert_eq!(run("1 2 3 2 L"), "1 [2 3]");
}

// --- Strings and chars ---

#[test]
fn string_concat_and_repr() {
    assert_eq!(run("\"ab\" \"cd\" +"), "\"abcd\"");
    assert_eq!(run("\"n=\" 5 +"), "\"n=5\"");
    assert_eq!(run("5 P"), "\"5\"");
}

#[test]
fn char_arithmetic() {
    assert_eq!(run("'a 1 +"), "'b");
    assert_eq!(run("'a 'b +"), "\"ab\"");
}

#[test]
fn string_interpolation() {
    assert_eq!(run("5:x ; \"v=$x\""), "\"v=5\"");
    assert_eq!(run("\"sum=$(1 2 +)\""), "\"sum=3\"");
}

#[test]
fn regex_replace_all() {
    assert_eq!(run("\"abc\" \"b\" \"X\" .&"), "\"aXc\"");
    assert_eq!(run("\"a1b22c\" \"[0-9]+\" \"-\" .&"), "\"a-b-c\"");
}

// --- Lists and vectorized arithmetic ---

#[test]
fn ranges() {
    assert_eq!(run("5 R"), "[1 2 3 4 5]");
    assert_eq!(run("3 .R"), "[0 1 2]");
    assert_eq!(run("-3 .R"), "[-2 -1 0]");
    assert_eq!(run("0 .R"), "[]");
}

#[test]
fn broadcast_against_scalars() {
    assert_eq!(run("[1 2 3] 10 *"), "[10 20 30]");
    assert_eq!(run("10 [1 2 3] -"), "[9 8 7]");
}

#[test]
fn broadcast_matches_explicit_map() {
    assert_eq!(run("[1 2 3] 2 *"), run("[1 2 3] # {2 *}"));
}

#[test]
fn plus_concatenates_lists() {
    assert_eq!(run("[1 2] [3 4] +"), "[1 2 3 4]");
}

#[test]
fn zip_with_block() {
    assert_eq!(run("[1 2 3] [4 5 6] {+} .&"), "[5 7 9]");
    let e = run_err("[1 2] [1 2 3] {+} .&");
    assert!(e.to_string().contains("length mismatch"), "{e}");
}

#[test]
fn map_forms() {
    assert_eq!(run("[1 2 3] # {10 *}"), "[10 20 30]");
    // Bare trailing code is captured up to and including the operator.
    assert_eq!(run("[1 2 3] # 1 +"), "[2 3 4]");
    assert_eq!(run("[1 2 3] :# {2 *}"), "[2 4 6]");
}

#[test]
fn list_utilities() {
    assert_eq!(run("[3 1 2] .C"), "[1 2 3]");
    assert_eq!(run("[1 2 3] V"), "[3 2 1]");
    assert_eq!(run("[1 2 3] .E"), "3");
    assert_eq!(run("3 A"), "[3]");
    assert_eq!(run("[1 [2 [3]]] .F"), "[1 2 3]");
    assert_eq!(run("[[1 2] [3 4]] .T"), "[[1 3] [2 4]]");
    assert_eq!(run("0 [1 2] .V"), "[0 1 2]");
    assert_eq!(run("[1 2] 3 .B"), "[1 2 3]");
    assert_eq!(run("[2 3]:l ; 1 l .V ; l"), "[1 2 3]");
}

#[test]
fn list_indexing() {
    assert_eq!(run("[10 20 30] .[1]"), "20");
    assert_eq!(run("[10 20 30] .[-1]"), "30");
    assert_eq!(run("[10 20 30] 0 I"), "10");
    assert_eq!(run("99 [10 20 30] .:[0]"), "[99 20 30]");
    assert!(matches!(run_err("[1] .[5]"), Error::Runtime(_)));
}

#[test]
fn filter_with_block_index() {
    assert_eq!(run("[1 2 3 4] {2 >} I"), "[3 4]");
}

#[test]
fn head_and_tail() {
    assert_eq!(run("[1 2 3] 2 .<"), "[1 2]");
    assert_eq!(run("[1 2 3] 2 .>"), "[2 3]");
    // Numbers fall through to the comparison reading.
    assert_eq!(run("3 5 .<"), "1");
    assert_eq!(run("3 5 .>"), "0");
}

// --- Variables and blocks ---

#[test]
fn assignment_peeks() {
    assert_eq!(run("5:x"), "5");
    assert_eq!(run("5:x ; x 1 +"), "6");
}

#[test]
fn blocks_auto_evaluate_on_get() {
    assert_eq!(run("{1 2 +}:f ; f"), "3");
    // A quote fetches the block itself.
    assert_eq!(run("{1 2 +}:f ; f.` ~"), "3");
}

#[test]
fn block_args_bind_in_declaration_order() {
    // First declared name takes the stack top.
    assert_eq!(run("{a b, a b -}:f ; 10 3 f"), "-7");
}

#[test]
fn typed_args_check() {
    assert_eq!(run("{a::num, a 1 +}:f ; 5 f"), "6");
    assert!(matches!(
        run_err("{a::num, a}:f ; \"s\" f"),
        Error::Runtime(_)
    ));
}

#[test]
fn local_initializers() {
    assert_eq!(run("{x(10), x 1 +}:f ; f"), "11");
}

#[test]
fn locals_do_not_leak() {
    assert_eq!(run("7:a ; {a, a}:f ; 1 f ; a"), "7");
}

#[test]
fn conditionals() {
    assert_eq!(run("1 {\"y\"} {\"n\"} ?"), "\"y\"");
    assert_eq!(run("0 {\"y\"} {\"n\"} ?"), "\"n\"");
    assert_eq!(run("1 {5} .?"), "5");
    assert_eq!(run("0 {5} .?"), "");
}

#[test]
fn falsy_values() {
    assert_eq!(run("0 {1} {2} ?"), "2");
    assert_eq!(run("\"\" {1} {2} ?"), "2");
    assert_eq!(run("[] {1} {2} ?"), "2");
    assert_eq!(run("[0] {1} {2} ?"), "1");
}

#[test]
fn while_loop() {
    assert_eq!(run("1 {2 * $ 100 <} W"), "128");
}

#[test]
fn eval_operator() {
    assert_eq!(run("\"1 2 +\" ~"), "3");
    assert_eq!(run("{1 2 +} ~"), "3");
    assert_eq!(run("5:x ; ::x ~"), "5");
    assert!(matches!(run_err("\"[1 2\" ~"), Error::Runtime(_)));
}

#[test]
fn case_takes_first_element() {
    assert_eq!(run("[5 6 7] .S"), "5");
    assert_eq!(run("[{1 2 +} 9] .S"), "3");
}

// --- Dicts and metatables ---

#[test]
fn dict_literals_and_key_access() {
    assert_eq!(run("{, 1:a 2:b}:d ; d.a d.b +"), "3");
    assert_eq!(run("{, 1:a} .E"), "1");
    assert_eq!(run("{,}:d ; 5 d.:c ; d.c"), "5");
}

#[test]
fn dict_literal_does_not_clobber_outer_vars() {
    assert_eq!(run("1:a ; {, 2:a}:d ; a d.a"), "1 2");
}

#[test]
fn missing_key_is_an_error() {
    assert!(matches!(run_err("{,}.nope"), Error::Runtime(_)));
}

#[test]
fn meta_lookup_chains() {
    assert_eq!(run("{,}:obj ; 9 obj .M .:v ; obj.v"), "9");
}

#[test]
fn metatable_overloads_add() {
    // rhs dict probes __add__, lhs dict probes __radd__.
    assert_eq!(
        run("{,}:a ; {self other, other 40 +} a .M .:__add__ ; 2 a +"),
        "42"
    );
    assert_eq!(run("{,}:a ; {self other, 7} a .M .:__radd__ ; a 1 +"), "7");
}

#[test]
fn metatable_overloads_len_and_eq() {
    assert_eq!(run("{,}:a ; {self, 99} a .M .:__len__ ; a .E"), "99");
    assert_eq!(run("{,}:a ; {self other, 1} a .M .:__eq__ ; 5 a ="), "1");
}

#[test]
fn dict_export() {
    // .W consumes the dict and pushes nothing back.
    assert_eq!(run("{, 3:z} .W z"), "3");
}

#[test]
fn dict_update_merges() {
    assert_eq!(run("{, 1:a}:d ; d {, 2:b} .+ ; d.a d.b +"), "3");
}

// --- Errors and try/catch ---

#[test]
fn raise_and_catch() {
    assert_eq!(run("{\"boom\" .D} {} .K"), "\"boom\"");
    assert_eq!(run("{\"boom\" .D} {; \"caught\"} .K"), "\"caught\"");
}

#[test]
fn try_runs_isolated_from_the_outer_stack() {
    // Partial results of a failed try are discarded.
    assert_eq!(run("1 2 {3 4 \"e\" .D} {;} .K"), "1 2");
    // A successful try contributes its results.
    assert_eq!(run("1 {2 3} {;} .K"), "1 2 3");
}

#[test]
fn type_error_message_shape() {
    let e = run_err("\"s\" 1 -");
    let msg = e.to_string();
    assert!(msg.contains("type error at ( - )"), "{msg}");
    assert!(msg.contains("received ("), "{msg}");
}

#[test]
fn syntax_errors_are_reported() {
    assert!(matches!(run_err("[1 2"), Error::Syntax(_)));
    assert!(matches!(run_err("1 }"), Error::Syntax(_)));
}

#[test]
fn compiled_repr_round_trips() {
    // Printing a compiled block yields source that compiles back to an
    // observably identical program.
    let src = "{, :1r2:h}:d ; 2 d.h + {2 ^} ~ [1 2 3] + :0xff +";
    let mut rt = Runtime::new();
    let blk = rt.compile(src).unwrap();
    let printed = blk.repr(rt.symbols());
    assert_eq!(run(&format!("{printed} ~")), run(src));
}

// --- File output ---

#[test]
fn write_and_append_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.txt");
    let p = path.display();
    run(&format!("\"hello\" \"{p}\" 0 .G"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
    run(&format!("\" more\" \"{p}\" 1 .G"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello more");
    run(&format!("\"fresh\" \"{p}\" 0 .G"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "fresh");
}

// --- The cairn binary ---

fn cairn() -> Command {
    Command::new(env!("CARGO_BIN_EXE_cairn"))
}

#[test]
fn cli_eval_flag() {
    let out = cairn()
        .args(["-e", "3 4 +"])
        .output()
        .expect("failed to run cairn");
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "7");
}

#[test]
fn cli_print_goes_to_stdout() {
    let out = cairn()
        .args(["-e", "\"hi\" .P"])
        .output()
        .expect("failed to run cairn");
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("hi"));
}

#[test]
fn cli_runs_script_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prog.cairn");
    std::fs::write(&path, "10 R # {$ *} .S\n").unwrap();
    let out = cairn().arg(&path).output().expect("failed to run cairn");
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "1");
}

#[test]
fn cli_reports_errors_on_stderr() {
    let out = cairn()
        .args(["-e", "[1 2"])
        .output()
        .expect("failed to run cairn");
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("syntax error"));
}

#[test]
fn cli_token_dump() {
    let out = cairn()
        .args(["--tokens", "-e", "1 2 +"])
        .output()
        .expect("failed to run cairn");
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout).lines().count(), 3);
}
