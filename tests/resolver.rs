#[cfg(test)]
mod resolver_tests {
    use walrus as lox;

    use lox::interpreter::Interpreter;
    use lox::parser::Parser;
    use lox::resolver::Resolver;
    use lox::scanner::Scanner;
    use lox::CaptureOutput;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn resolve_errors(source: &str) -> Vec<String> {
        init_logger();

        let (tokens, lex_errors) = Scanner::new(source).scan_all();
        assert!(lex_errors.is_empty(), "lex errors: {:?}", lex_errors);

        let stmts = match Parser::new(tokens).parse() {
            Ok(stmts) => stmts,
            Err(errors) => panic!("parse errors: {:?}", errors),
        };

        let mut interpreter = Interpreter::with_output(CaptureOutput::new());
        match Resolver::new(&mut interpreter).resolve(&stmts) {
            Ok(()) => Vec::new(),
            Err(errors) => errors.iter().map(|e| e.to_string()).collect(),
        }
    }

    #[test]
    fn test_valid_programs_resolve_cleanly() {
        let sources = [
            "{ var a = 1; { var a = a + 1; print a; } }",
            "var a = a;",
            "function f(n) { if (n > 0) return f(n - 1); return n; }",
            "class C { init() { return; } }",
            "class A { m() { return this; } } class B extends A { m() { return super.m(); } }",
            "var a = 1; var a = 2;",
        ];

        for source in sources {
            assert_eq!(resolve_errors(source), Vec::<String>::new(), "{}", source);
        }
    }

    #[test]
    fn test_own_initializer() {
        assert_eq!(
            resolve_errors("{ var a = a; }"),
            vec!["[line 1] Error at 'a': Can't read local variable in its own initializer."]
        );
    }

    #[test]
    fn test_duplicate_local() {
        assert_eq!(
            resolve_errors("{ var a = 1;\n var a = 2; }"),
            vec!["[line 2] Error at 'a': Already a variable with this name in this scope."]
        );
        assert_eq!(
            resolve_errors("function f(x, x) {}"),
            vec!["[line 1] Error at 'x': Already a variable with this name in this scope."]
        );
    }

    #[test]
    fn test_return_rules() {
        assert_eq!(
            resolve_errors("return 1;"),
            vec!["[line 1] Error at 'return': Can't return from top-level code."]
        );
        assert_eq!(
            resolve_errors("class C { init() { return 1; } }"),
            vec!["[line 1] Error at 'return': Can't return a literal from an initializer."]
        );
        assert!(resolve_errors("class C { init() { function f() { return 1; } } }").is_empty());
    }

    #[test]
    fn test_this_and_super_placement() {
        assert_eq!(
            resolve_errors("print this;"),
            vec!["[line 1] Error at 'this': Can't use 'this' outside of a class."]
        );
        assert_eq!(
            resolve_errors("function f() { return this; }"),
            vec!["[line 1] Error at 'this': Can't use 'this' outside of a class."]
        );
        assert_eq!(
            resolve_errors("print super.x;"),
            vec!["[line 1] Error at 'super': Can't use 'super' outside of a class."]
        );
        assert_eq!(
            resolve_errors("class A { m() { return super.m(); } }"),
            vec!["[line 1] Error at 'super': Can't use 'super' in a class with no superclass."]
        );
    }

    #[test]
    fn test_self_inheritance() {
        assert_eq!(
            resolve_errors("class A extends A {}"),
            vec!["[line 1] Error at 'A': A class can't inherit from itself."]
        );
    }

    #[test]
    fn test_all_errors_collected() {
        let errors = resolve_errors("return 1;\nprint this;\n{ var b = b; }");

        assert_eq!(errors.len(), 3);
        assert!(errors[0].starts_with("[line 1]"));
        assert!(errors[1].starts_with("[line 2]"));
        assert!(errors[2].starts_with("[line 3]"));
    }
}
