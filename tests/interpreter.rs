#[cfg(test)]
mod interpreter_tests {
    use std::cell::RefCell;
    use std::io::{self, Write};
    use std::rc::Rc;

    use loxide as lox;

    use lox::interpreter::Interpreter;
    use lox::parser::Parser;
    use lox::resolver::Resolver;
    use lox::scanner::Scanner;

    /// Clonable sink capturing everything the interpreter prints.
    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);

            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn lines(&self) -> Vec<String> {
            String::from_utf8(self.0.borrow().clone())
                .expect("interpreter output was not UTF-8")
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    /// Run one program through the whole pipeline against `interpreter`.
    /// Panics on scan/parse/resolve errors; returns the runtime error, if
    /// any, as its display string.
    fn run_with(interpreter: &mut Interpreter, source: &str) -> Option<String> {
        let scanner = Scanner::new(source.as_bytes().to_vec());
        let tokens: Vec<_> = scanner
            .collect::<Result<Vec<_>, _>>()
            .expect("scan errors in test program");

        let mut parser = Parser::new(tokens);
        let (statements, errors) = parser.parse();

        assert!(errors.is_empty(), "parse errors in test program: {:?}", errors);

        let mut resolver = Resolver::new(interpreter);
        resolver
            .resolve(&statements)
            .expect("resolve errors in test program");

        interpreter.interpret(&statements).err().map(|e| e.to_string())
    }

    fn run(source: &str) -> (Vec<String>, Option<String>) {
        let buf = SharedBuf::default();
        let mut interpreter = Interpreter::with_output(Box::new(buf.clone()));

        let error = run_with(&mut interpreter, source);

        (buf.lines(), error)
    }

    fn expect_output(source: &str, expected: &[&str]) {
        let (lines, error) = run(source);

        assert_eq!(error, None, "unexpected runtime error");
        assert_eq!(lines, expected);
    }

    fn expect_runtime_error(source: &str, fragment: &str) {
        let (_, error) = run(source);

        match error {
            Some(message) => assert!(
                message.contains(fragment),
                "expected '{}' in '{}'",
                fragment,
                message
            ),
            None => panic!("expected runtime error for: {}", source),
        }
    }

    // ── arithmetic, printing, stringification ──────────────────────────

    #[test]
    fn test_interp_01_addition() {
        expect_output("var a = 1; var b = 2; print a + b;", &["3"]);
    }

    #[test]
    fn test_interp_02_number_formatting() {
        expect_output(
            "print 1.0; print 2.5; print 0.0; print 10 / 4;",
            &["1", "2.5", "0", "2.5"],
        );
    }

    #[test]
    fn test_interp_03_string_coercion_in_plus() {
        expect_output("var x = \"hi \"; x = x + 42; print x;", &["hi 42"]);
        expect_output("print 1 + \" of \" + 3;", &["1 of 3"]);
        expect_output("print \"is \" + true;", &["is true"]);
        expect_output("print \"none: \" + nil;", &["none: nil"]);
    }

    #[test]
    fn test_interp_04_comparison_and_equality() {
        expect_output(
            "print 1 < 2; print 2 <= 2; print 3 > 4; print 1 == 1; print 1 != 1;",
            &["true", "true", "false", "true", "false"],
        );

        // Mixed kinds never compare equal.
        expect_output(
            "print 1 == \"1\"; print nil == nil; print nil == false;",
            &["false", "true", "false"],
        );
    }

    #[test]
    fn test_interp_05_truthiness() {
        // Only nil and false are falsey; 0 and "" are truthy.
        expect_output(
            "if (0) print \"zero\"; if (\"\") print \"empty\"; if (nil) print \"nil\"; if (false) print \"false\";",
            &["zero", "empty"],
        );
    }

    #[test]
    fn test_interp_06_unary_operators() {
        expect_output("print -(3); print !nil; print !0;", &["-3", "true", "false"]);
    }

    // ── control flow ───────────────────────────────────────────────────

    #[test]
    fn test_interp_07_short_circuit_keeps_operand_values() {
        expect_output(
            "print \"a\" or \"b\"; print nil or \"b\"; print nil and \"b\"; print 1 and 2;",
            &["a", "b", "nil", "2"],
        );
    }

    #[test]
    fn test_interp_08_short_circuit_skips_side_effects() {
        expect_output(
            "fun side() { print \"side\"; return true; } \
             false and side(); true or side(); print \"done\";",
            &["done"],
        );
    }

    #[test]
    fn test_interp_09_ternary_evaluates_one_arm() {
        expect_output(
            "fun a() { print \"a\"; return 1; } \
             fun b() { print \"b\"; return 2; } \
             print true ? a() : b(); print false ? a() : b();",
            &["a", "1", "b", "2"],
        );
    }

    #[test]
    fn test_interp_10_for_loop() {
        expect_output("for (var i = 0; i < 3; i = i + 1) print i;", &["0", "1", "2"]);
    }

    #[test]
    fn test_interp_11_while_loop() {
        expect_output(
            "var i = 3; while (i > 0) { print i; i = i - 1; }",
            &["3", "2", "1"],
        );
    }

    // ── scoping and closures ───────────────────────────────────────────

    #[test]
    fn test_interp_12_block_shadowing() {
        expect_output(
            "var a = \"outer\"; { var a = \"inner\"; print a; } print a;",
            &["inner", "outer"],
        );
    }

    #[test]
    fn test_interp_13_closure_counter() {
        expect_output(
            "fun make() { var i = 0; fun inc() { i = i + 1; return i; } return inc; } \
             var c = make(); print c(); print c(); print c();",
            &["1", "2", "3"],
        );
    }

    #[test]
    fn test_interp_14_closures_are_independent() {
        expect_output(
            "fun make() { var i = 0; fun inc() { i = i + 1; return i; } return inc; } \
             var a = make(); var b = make(); print a(); print a(); print b();",
            &["1", "2", "1"],
        );
    }

    #[test]
    fn test_interp_15_closure_captures_defining_scope() {
        // The classic binding test: the closure sees the variable it
        // captured, not a later shadow.
        expect_output(
            "var a = \"global\"; \
             { fun show() { print a; } show(); var a = \"block\"; show(); }",
            &["global", "global"],
        );
    }

    #[test]
    fn test_interp_16_recursion() {
        expect_output(
            "fun fib(n) { if (n < 2) return n; return fib(n-1) + fib(n-2); } print fib(10);",
            &["55"],
        );
    }

    #[test]
    fn test_interp_17_lambda_values() {
        expect_output(
            "var add = fun (a, b) { return a + b; }; print add(1, 2); \
             fun apply(f, x) { return f(x); } print apply(fun (n) { return n * n; }, 9);",
            &["3", "81"],
        );
    }

    #[test]
    fn test_interp_18_function_without_return_yields_nil() {
        expect_output("fun noop() {} print noop();", &["nil"]);
    }

    // ── classes ────────────────────────────────────────────────────────

    #[test]
    fn test_interp_19_fields_and_init() {
        expect_output(
            "class P { init(x) { this.x = x; } } var p = P(7); print p.x;",
            &["7"],
        );
    }

    #[test]
    fn test_interp_20_fields_created_on_first_write() {
        expect_output(
            "class Bag {} var b = Bag(); b.thing = 12; print b.thing;",
            &["12"],
        );
    }

    #[test]
    fn test_interp_21_methods_and_this() {
        expect_output(
            "class Counter { init() { this.n = 0; } bump() { this.n = this.n + 1; return this.n; } } \
             var c = Counter(); c.bump(); c.bump(); print c.bump();",
            &["3"],
        );
    }

    #[test]
    fn test_interp_22_bound_methods_keep_their_instance() {
        expect_output(
            "class A { init() { this.tag = \"a\"; } who() { print this.tag; } } \
             var m = A().who; m();",
            &["a"],
        );
    }

    #[test]
    fn test_interp_23_inheritance_and_super() {
        expect_output(
            "class A { greet() { print \"hi\"; } } \
             class B < A { greet() { super.greet(); print \"there\"; } } \
             B().greet();",
            &["hi", "there"],
        );
    }

    #[test]
    fn test_interp_24_inherited_methods() {
        expect_output(
            "class A { m() { return \"from A\"; } } class B < A {} print B().m();",
            &["from A"],
        );
    }

    #[test]
    fn test_interp_25_init_early_return_yields_instance() {
        expect_output(
            "class P { init(x) { this.x = x; if (x > 0) return; this.x = 0; } } \
             print P(5).x; print P(-1).x;",
            &["5", "0"],
        );
    }

    #[test]
    fn test_interp_26_class_and_instance_display() {
        expect_output(
            "class Foo {} print Foo; print Foo();",
            &["Foo", "Foo instance"],
        );
    }

    #[test]
    fn test_interp_27_instance_equality_is_identity() {
        expect_output(
            "class A {} var a = A(); var b = a; var c = A(); print a == b; print a == c;",
            &["true", "false"],
        );
    }

    // ── runtime errors ─────────────────────────────────────────────────

    #[test]
    fn test_interp_28_division_by_zero() {
        expect_runtime_error("print 1/0;", "Cannot divide by 0");
    }

    #[test]
    fn test_interp_29_operand_type_errors() {
        expect_runtime_error("print -\"a\";", "Operand must be a number.");
        expect_runtime_error("print 1 < \"2\";", "Operand must be a number.");
        expect_runtime_error("print true + false;", "Operands must be two numbers or two strings.");
    }

    #[test]
    fn test_interp_30_undefined_variable() {
        expect_runtime_error("print missing;", "Undefined variable 'missing'.");
        expect_runtime_error("missing = 1;", "Undefined variable 'missing'.");
    }

    #[test]
    fn test_interp_31_call_errors() {
        expect_runtime_error("var x = 1; x();", "Can only call functions and classes.");
        expect_runtime_error("fun f(a) {} f(1, 2);", "Expected 1 arguments, but got 2.");
        expect_runtime_error("class P { init(x) {} } P();", "Expected 1 arguments, but got 0.");
    }

    #[test]
    fn test_interp_32_property_errors() {
        expect_runtime_error("print 4 .x;", "Only instances have properties.");
        expect_runtime_error("4 .x = 1;", "Only instances have fields.");
        expect_runtime_error(
            "class A {} print A().nope;",
            "Undefined property 'nope'.",
        );
    }

    #[test]
    fn test_interp_33_superclass_must_be_a_class() {
        expect_runtime_error("var NotAClass = 1; class B < NotAClass {}", "Superclass must be a class.");
    }

    #[test]
    fn test_interp_34_runtime_error_carries_line() {
        let (_, error) = run("var a = 1;\nvar b = 0;\nprint a / b;");

        let message = error.expect("expected runtime error");
        assert!(message.contains("[line 3]"), "got: {}", message);
    }

    // ── state across runs (prompt behavior) ────────────────────────────

    #[test]
    fn test_interp_35_globals_persist_across_runs() {
        let buf = SharedBuf::default();
        let mut interpreter = Interpreter::with_output(Box::new(buf.clone()));

        assert_eq!(run_with(&mut interpreter, "var a = 40;"), None);
        assert_eq!(run_with(&mut interpreter, "a = a + 2;"), None);
        assert_eq!(run_with(&mut interpreter, "print a;"), None);

        assert_eq!(buf.lines(), vec!["42"]);
    }

    #[test]
    fn test_interp_36_frame_restored_after_runtime_error() {
        let buf = SharedBuf::default();
        let mut interpreter = Interpreter::with_output(Box::new(buf.clone()));

        // The error unwinds out of a nested block...
        let error = run_with(&mut interpreter, "var a = \"ok\"; { var b = 1; { print c; } }");
        assert!(error.is_some());

        // ...and the next run still sees an intact globals frame.
        assert_eq!(run_with(&mut interpreter, "print a;"), None);
        assert_eq!(buf.lines(), vec!["ok"]);
    }

    #[test]
    fn test_interp_37_nested_block_comment_program() {
        expect_output("/* a /* b */ c */ print 1;", &["1"]);
    }

    #[test]
    fn test_interp_38_clock_is_a_number() {
        expect_output("print clock() > 0;", &["true"]);
    }

    #[test]
    fn test_interp_39_scope_distance_with_deep_nesting() {
        expect_output(
            "var x = \"g\"; \
             { var x = \"1\"; { var x = \"2\"; { print x; } print x; } print x; } print x;",
            &["2", "2", "1", "g"],
        );
    }

    #[test]
    fn test_interp_40_arguments_evaluate_left_to_right() {
        expect_output(
            "fun tag(n) { print n; return n; } \
             fun three(a, b, c) { return c; } \
             print three(tag(1), tag(2), tag(3));",
            &["1", "2", "3", "3"],
        );
    }
}
