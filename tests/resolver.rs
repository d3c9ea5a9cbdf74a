#[cfg(test)]
mod resolver_tests {
    use loxide as lox;

    use lox::interpreter::Interpreter;
    use lox::parser::Parser;
    use lox::resolver::Resolver;
    use lox::scanner::Scanner;

    /// Scan, parse, and resolve; returns the resolver's verdict.
    fn resolve(source: &str) -> Result<(), String> {
        let scanner = Scanner::new(source.as_bytes().to_vec());
        let tokens: Vec<_> = scanner.filter_map(Result::ok).collect();

        let mut parser = Parser::new(tokens);
        let (statements, errors) = parser.parse();

        assert!(errors.is_empty(), "unexpected parse errors: {:?}", errors);

        let mut interpreter = Interpreter::new();
        let mut resolver = Resolver::new(&mut interpreter);

        resolver.resolve(&statements).map_err(|e| e.to_string())
    }

    fn assert_resolve_error(source: &str, expected_fragment: &str) {
        match resolve(source) {
            Err(message) => assert!(
                message.contains(expected_fragment),
                "expected '{}' in '{}'",
                expected_fragment,
                message
            ),
            Ok(()) => panic!("expected resolve error for: {}", source),
        }
    }

    #[test]
    fn test_resolver_01_own_initializer() {
        assert_resolve_error(
            "{ var a = a; }",
            "Can't read local variable in its own initializer.",
        );
    }

    #[test]
    fn test_resolver_02_duplicate_declaration_in_scope() {
        assert_resolve_error(
            "{ var a = 1; var a = 2; }",
            "Already a variable with this name in this scope.",
        );
    }

    #[test]
    fn test_resolver_03_top_level_redeclaration_is_allowed() {
        assert_eq!(resolve("var a = 1; var a = 2;"), Ok(()));
    }

    #[test]
    fn test_resolver_04_return_outside_function() {
        assert_resolve_error("return 1;", "'return' used outside of function");
    }

    #[test]
    fn test_resolver_05_return_value_from_initializer() {
        assert_resolve_error(
            "class P { init(x) { this.x = x; return x; } }",
            "Can't return a value from an initializer.",
        );
    }

    #[test]
    fn test_resolver_06_bare_return_from_initializer_is_allowed() {
        assert_eq!(
            resolve("class P { init(x) { this.x = x; return; } }"),
            Ok(())
        );
    }

    #[test]
    fn test_resolver_07_this_outside_class() {
        assert_resolve_error("print this;", "Cannot use 'this' outside of a class");
    }

    #[test]
    fn test_resolver_08_this_in_nested_function_of_method_is_allowed() {
        assert_eq!(
            resolve("class A { m() { fun inner() { return this; } return inner; } }"),
            Ok(())
        );
    }

    #[test]
    fn test_resolver_09_super_outside_class() {
        assert_resolve_error("print super.m;", "Cannot use 'super' outside of a class.");
    }

    #[test]
    fn test_resolver_10_super_without_superclass() {
        assert_resolve_error(
            "class A { m() { return super.m; } }",
            "Can't use 'super' keyword in a class with no superclass.",
        );
    }

    #[test]
    fn test_resolver_11_super_with_superclass_is_allowed() {
        assert_eq!(
            resolve("class A { m() {} } class B < A { m() { return super.m; } }"),
            Ok(())
        );
    }

    #[test]
    fn test_resolver_12_self_inheritance() {
        assert_resolve_error("class A < A {}", "A class can't inherit from itself.");
    }

    #[test]
    fn test_resolver_13_recursive_function_is_allowed() {
        assert_eq!(resolve("fun f(n) { if (n > 0) f(n - 1); }"), Ok(()));

        // Also when the declaration itself is local.
        assert_eq!(resolve("{ fun f(n) { if (n > 0) f(n - 1); } }"), Ok(()));
    }

    #[test]
    fn test_resolver_14_duplicate_parameters() {
        assert_resolve_error(
            "fun f(a, a) {}",
            "Already a variable with this name in this scope.",
        );
    }

    #[test]
    fn test_resolver_15_lambda_body_is_checked() {
        assert_resolve_error(
            "var f = fun () { return this; };",
            "Cannot use 'this' outside of a class",
        );
    }

    #[test]
    fn test_resolver_16_return_inside_lambda_is_allowed() {
        assert_eq!(resolve("var f = fun (a) { return a; };"), Ok(()));
    }

    #[test]
    fn test_resolver_17_shadowing_in_inner_scope_is_allowed() {
        assert_eq!(resolve("{ var a = 1; { var a = 2; print a; } }"), Ok(()));
    }
}
