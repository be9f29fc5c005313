#[cfg(test)]
mod parser_tests {
    use walrus as lox;

    use lox::ast::{Expr, LiteralValue, Stmt};
    use lox::error::LoxError;
    use lox::parser::Parser;
    use lox::scanner::Scanner;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn parse(source: &str) -> Result<Vec<Stmt>, Vec<LoxError>> {
        init_logger();

        let (tokens, errors) = Scanner::new(source).scan_all();
        assert!(errors.is_empty(), "lex errors: {:?}", errors);

        Parser::new(tokens).parse()
    }

    fn parse_ok(source: &str) -> Vec<Stmt> {
        match parse(source) {
            Ok(stmts) => stmts,
            Err(errors) => panic!("unexpected parse errors: {:?}", errors),
        }
    }

    fn parse_errors(source: &str) -> Vec<String> {
        match parse(source) {
            Ok(stmts) => panic!("expected errors, parsed {:?}", stmts),
            Err(errors) => errors.iter().map(|e| e.to_string()).collect(),
        }
    }

    /// Fully parenthesised prefix form, so tests can see the tree shape.
    fn sexpr(expr: &Expr) -> String {
        match expr {
            Expr::Literal(LiteralValue::Number(n)) => n.to_string(),
            Expr::Literal(LiteralValue::Str(s)) => format!("{:?}", s),
            Expr::Literal(LiteralValue::True) => "true".into(),
            Expr::Literal(LiteralValue::False) => "false".into(),
            Expr::Literal(LiteralValue::Null) => "null".into(),
            Expr::Grouping(inner) => format!("(group {})", sexpr(inner)),
            Expr::Unary { operator, right } => format!("({} {})", operator.lexeme, sexpr(right)),
            Expr::Binary {
                left,
                operator,
                right,
            }
            | Expr::Logical {
                left,
                operator,
                right,
            } => format!("({} {} {})", operator.lexeme, sexpr(left), sexpr(right)),
            Expr::Variable { name, .. } => name.lexeme.clone(),
            Expr::Assign { name, value, .. } => format!("(= {} {})", name.lexeme, sexpr(value)),
            Expr::Call {
                callee, arguments, ..
            } => {
                let mut s = format!("(call {}", sexpr(callee));
                for arg in arguments {
                    s.push(' ');
                    s.push_str(&sexpr(arg));
                }
                s.push(')');
                s
            }
            Expr::Get { object, name } => format!("(. {} {})", sexpr(object), name.lexeme),
            Expr::Set {
                object,
                name,
                value,
            } => format!("(.= {} {} {})", sexpr(object), name.lexeme, sexpr(value)),
            Expr::This { .. } => "this".into(),
            Expr::Super { method, .. } => format!("(super {})", method.lexeme),
        }
    }

    fn expr_of(source: &str) -> String {
        let stmts = parse_ok(&format!("{};", source));
        match stmts.as_slice() {
            [Stmt::Expression(expr)] => sexpr(expr),
            other => panic!("expected one expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence() {
        assert_eq!(expr_of("1 + 2 * 3"), "(+ 1 (* 2 3))");
        assert_eq!(expr_of("(1 + 2) * 3"), "(* (group (+ 1 2)) 3)");
        assert_eq!(expr_of("1 - 2 - 3"), "(- (- 1 2) 3)");
        assert_eq!(expr_of("a || b && c == d < e"), "(|| a (&& b (== c (< d e))))");
        assert_eq!(expr_of("7 /% 2 % 3 / 4"), "(/ (% (/% 7 2) 3) 4)");
        assert_eq!(expr_of("!-x"), "(! (- x))");
        assert_eq!(expr_of("++x * 2"), "(* (++ x) 2)");
    }

    #[test]
    fn test_power_is_left_associative_and_below_unary() {
        assert_eq!(expr_of("2 ** 3 ** 2"), "(** (** 2 3) 2)");
        assert_eq!(expr_of("-2 ** 2"), "(** (- 2) 2)");
        assert_eq!(expr_of("2 * 3 ** 2"), "(* 2 (** 3 2))");
    }

    #[test]
    fn test_calls_and_properties() {
        assert_eq!(expr_of("f(1, g(2))(3)"), "(call (call f 1 (call g 2)) 3)");
        assert_eq!(expr_of("a.b.c()"), "(call (. (. a b) c))");
        assert_eq!(expr_of("a.b = c = 1"), "(.= a b (= c 1))");
        assert_eq!(expr_of("arr.get(0)"), "(call (. arr get) 0)");
    }

    #[test]
    fn test_literals() {
        assert_eq!(expr_of("\"hi\""), "\"hi\"");
        assert_eq!(expr_of("null"), "null");
        assert_eq!(expr_of("true != false"), "(!= true false)");
        assert_eq!(expr_of("2.5"), "2.5");
    }

    #[test]
    fn test_assignment_targets() {
        assert_eq!(
            parse_errors("1 = 2;"),
            vec!["[line 1] Error at '=': Invalid assignment target."]
        );
        assert_eq!(
            parse_errors("a + b = c;"),
            vec!["[line 1] Error at '=': Invalid assignment target."]
        );
    }

    #[test]
    fn test_for_desugars_to_while() {
        let stmts = parse_ok("for (var i = 0; i < 3; i = i + 1) print i;");

        let [Stmt::Block(outer)] = stmts.as_slice() else {
            panic!("expected block, got {:?}", stmts);
        };
        assert!(matches!(outer[0], Stmt::Var { .. }));

        let Stmt::While { condition, body } = &outer[1] else {
            panic!("expected while, got {:?}", outer[1]);
        };
        assert_eq!(sexpr(condition), "(< i 3)");

        let Stmt::Block(body) = body.as_ref() else {
            panic!("expected body block");
        };
        assert!(matches!(body[0], Stmt::Print(_)));
        assert!(matches!(&body[1], Stmt::Expression(e) if sexpr(e) == "(= i (+ i 1))"));
    }

    #[test]
    fn test_bare_for_has_true_condition_and_no_wrapping() {
        let stmts = parse_ok("for (;;) print 1;");

        let [Stmt::While { condition, body }] = stmts.as_slice() else {
            panic!("expected bare while, got {:?}", stmts);
        };
        assert_eq!(*condition, Expr::Literal(LiteralValue::True));
        assert!(matches!(body.as_ref(), Stmt::Print(_)));
    }

    #[test]
    fn test_class_declaration() {
        let stmts = parse_ok("class B extends A { init(x) { this.x = x; } get() { return super.get(); } }");

        let [Stmt::Class {
            name,
            superclass,
            methods,
        }] = stmts.as_slice()
        else {
            panic!("expected class, got {:?}", stmts);
        };

        assert_eq!(name.lexeme, "B");
        assert!(matches!(superclass, Some(Expr::Variable { name, .. }) if name.lexeme == "A"));
        assert_eq!(methods.len(), 2);
        assert_eq!(methods[0].name.lexeme, "init");
        assert_eq!(methods[0].params.len(), 1);

        let Stmt::Return {
            value: Some(value), ..
        } = &methods[1].body[0]
        else {
            panic!("expected return");
        };
        assert_eq!(sexpr(value), "(call (super get))");
    }

    #[test]
    fn test_variable_nodes_have_distinct_ids() {
        let stmts = parse_ok("x; x;");

        let ids: Vec<_> = stmts
            .iter()
            .map(|s| match s {
                Stmt::Expression(Expr::Variable { id, .. }) => *id,
                other => panic!("unexpected {:?}", other),
            })
            .collect();

        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            parse_errors("print 1"),
            vec!["[line 1] Error at end: Expect ';' after value."]
        );
        assert_eq!(
            parse_errors("class { }"),
            vec!["[line 1] Error at '{': Expect class name."]
        );
        assert_eq!(
            parse_errors("class A extends { }"),
            vec!["[line 1] Error at '{': Expect superclass name."]
        );
        assert_eq!(
            parse_errors("class A ;"),
            vec!["[line 1] Error at ';': Expect '{' before class body."]
        );
        assert_eq!(
            parse_errors("super;"),
            vec!["[line 1] Error at ';': Expect '.' after 'super'."]
        );
        assert_eq!(
            parse_errors("a.;"),
            vec!["[line 1] Error at ';': Expect property name after '.'."]
        );
        assert_eq!(
            parse_errors(")"),
            vec!["[line 1] Error at ')': Expect expression."]
        );
    }

    #[test]
    fn test_argument_and_parameter_limits() {
        let args: Vec<String> = (0..256).map(|i| i.to_string()).collect();
        let errors = parse_errors(&format!("f({});", args.join(", ")));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].ends_with("Can't have more than 255 arguments."));

        let params: Vec<String> = (0..256).map(|i| format!("p{}", i)).collect();
        let errors = parse_errors(&format!("function f({}) {{}}", params.join(", ")));
        assert!(errors[0].ends_with("Can't have more than 255 parameters."));

        let args: Vec<String> = (0..255).map(|i| i.to_string()).collect();
        parse_ok(&format!("f({});", args.join(", ")));
    }

    #[test]
    fn test_recovery_reports_every_error_and_drops_broken_statements() {
        init_logger();

        let source = "print 1;\nvar = 2;\nprint 3;\nprint (4;\nprint 5;";
        let (tokens, _) = Scanner::new(source).scan_all();
        let (stmts, errors) = Parser::new(tokens).parse_recovering();

        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].line(), Some(2));
        assert_eq!(errors[1].line(), Some(4));

        let printed: Vec<String> = stmts
            .iter()
            .map(|s| match s {
                Stmt::Print(e) => sexpr(e),
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(printed, vec!["1", "3", "5"]);
    }

    #[test]
    fn test_error_inside_block_keeps_surrounding_statements() {
        init_logger();

        let (tokens, _) = Scanner::new("{ print 1; print ; print 2; }").scan_all();
        let (stmts, errors) = Parser::new(tokens).parse_recovering();

        assert_eq!(errors.len(), 1);
        let [Stmt::Block(inner)] = stmts.as_slice() else {
            panic!("expected block, got {:?}", stmts);
        };
        assert_eq!(inner.len(), 2);
    }

    #[test]
    fn test_missing_eof_is_tolerated() {
        init_logger();

        let (mut tokens, _) = Scanner::new("print 1;").scan_all();
        tokens.pop();

        assert_eq!(Parser::new(tokens).parse().map(|s| s.len()).ok(), Some(1));
        assert_eq!(Parser::new(Vec::new()).parse().map(|s| s.len()).ok(), Some(0));
    }
}
