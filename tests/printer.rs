#[cfg(test)]
mod printer_tests {
    use walrus as lox;

    use lox::ast::{Expr, LiteralValue, Stmt};
    use lox::ast_printer::AstPrinter;
    use lox::parser::Parser;
    use lox::scanner::Scanner;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn parse(source: &str) -> Vec<Stmt> {
        init_logger();

        let (tokens, errors) = Scanner::new(source).scan_all();
        assert!(errors.is_empty(), "lex errors in {:?}: {:?}", source, errors);

        match Parser::new(tokens).parse() {
            Ok(stmts) => stmts,
            Err(errors) => panic!("parse errors in {:?}: {:?}", source, errors),
        }
    }

    /// Tree shape with node ids and line numbers left out, so trees from
    /// different parses can be compared.
    fn shape(expr: &Expr) -> String {
        match expr {
            Expr::Literal(LiteralValue::Number(n)) => format!("{:?}", n),
            Expr::Literal(LiteralValue::Str(s)) => format!("{:?}", s),
            Expr::Literal(LiteralValue::True) => "true".into(),
            Expr::Literal(LiteralValue::False) => "false".into(),
            Expr::Literal(LiteralValue::Null) => "null".into(),
            Expr::Grouping(inner) => format!("(group {})", shape(inner)),
            Expr::Unary { operator, right } => format!("({} {})", operator.lexeme, shape(right)),
            Expr::Binary {
                left,
                operator,
                right,
            } => format!("({} {} {})", operator.lexeme, shape(left), shape(right)),
            Expr::Logical {
                left,
                operator,
                right,
            } => format!("(logical {} {} {})", operator.lexeme, shape(left), shape(right)),
            Expr::Variable { name, .. } => name.lexeme.clone(),
            Expr::Assign { name, value, .. } => format!("(= {} {})", name.lexeme, shape(value)),
            Expr::Call {
                callee, arguments, ..
            } => {
                let args: Vec<String> = arguments.iter().map(shape).collect();
                format!("(call {} [{}])", shape(callee), args.join(" "))
            }
            Expr::Get { object, name } => format!("(. {} {})", shape(object), name.lexeme),
            Expr::Set {
                object,
                name,
                value,
            } => format!("(.= {} {} {})", shape(object), name.lexeme, shape(value)),
            Expr::This { .. } => "this".into(),
            Expr::Super { method, .. } => format!("(super {})", method.lexeme),
        }
    }

    fn optional(expr: &Option<Expr>) -> String {
        expr.as_ref().map_or("-".to_string(), shape)
    }

    fn block(stmts: &[Stmt]) -> String {
        let inner: Vec<String> = stmts.iter().map(stmt_shape).collect();
        format!("{{{}}}", inner.join(" "))
    }

    fn stmt_shape(stmt: &Stmt) -> String {
        match stmt {
            Stmt::Block(stmts) => block(stmts),
            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                let methods: Vec<String> = methods
                    .iter()
                    .map(|m| {
                        let params: Vec<&str> = m.params.iter().map(|p| p.lexeme.as_str()).collect();
                        format!("({} [{}] {})", m.name.lexeme, params.join(" "), block(&m.body))
                    })
                    .collect();
                format!("(class {} {} {})", name.lexeme, optional(superclass), methods.join(" "))
            }
            Stmt::Expression(expr) => format!("(expr {})", shape(expr)),
            Stmt::Function(decl) => {
                let params: Vec<&str> = decl.params.iter().map(|p| p.lexeme.as_str()).collect();
                format!("(fun {} [{}] {})", decl.name.lexeme, params.join(" "), block(&decl.body))
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => format!(
                "(if {} {} {})",
                shape(condition),
                stmt_shape(then_branch),
                else_branch.as_deref().map_or("-".to_string(), stmt_shape)
            ),
            Stmt::Print(expr) => format!("(print {})", shape(expr)),
            Stmt::Return { value, .. } => format!("(return {})", optional(value)),
            Stmt::Var { name, initializer } => format!("(var {} {})", name.lexeme, optional(initializer)),
            Stmt::While { condition, body } => format!("(while {} {})", shape(condition), stmt_shape(body)),
        }
    }

    fn program_shape(stmts: &[Stmt]) -> Vec<String> {
        stmts.iter().map(stmt_shape).collect()
    }

    /// Printing and re-parsing must give back the same tree, and printing
    /// that tree again must give the same text.
    fn assert_round_trip(source: &str) {
        let original = parse(source);
        let printed = AstPrinter::print_program(&original);
        let reparsed = parse(&printed);

        assert_eq!(
            program_shape(&original),
            program_shape(&reparsed),
            "source: {}\nprinted: {}",
            source,
            printed
        );
        assert_eq!(printed, AstPrinter::print_program(&reparsed), "source: {}", source);
    }

    #[test]
    fn test_expression_forms() {
        let stmts = parse("1 + 2 * (3 - -x) ** 2 /% 4;");
        let [Stmt::Expression(expr)] = stmts.as_slice() else {
            panic!("expected expression");
        };

        assert_eq!(AstPrinter::print(expr), "1 + 2 * (3 - - x) ** 2 /% 4");
    }

    #[test]
    fn test_statement_forms() {
        let source = "class B extends A { init(a, b) { this.a = a; } m() { return super.m(); } }";
        assert_eq!(
            AstPrinter::print_program(&parse(source)),
            "class B extends A {\n    init(a, b) {\n        this.a = a;\n    }\n    m() {\n        return super.m();\n    }\n}"
        );

        assert_eq!(
            AstPrinter::print_program(&parse("var s = \"hi\"; var n; if (s) print 1.5; else { }")),
            "var s = \"hi\";\nvar n;\nif (s) print 1.5; else {}"
        );
    }

    #[test]
    fn test_round_trip_expressions() {
        for source in [
            "1 + 2 * 3;",
            "(1 + 2) * 3;",
            "2 ** 3 ** 2;",
            "-2 ** 2;",
            "- -x;",
            "!!flag;",
            "++a + --b;",
            "a = b = c;",
            "a.b.c = d.e(f, g)(h);",
            "x || y && z == w != v < u <= t > s >= r;",
            "7 % 3 /% 2 / 1;",
            "\"text\" + 1 + null + true + false;",
            "0.1 + 100000000000000000000 + 0.0000001;",
        ] {
            assert_round_trip(source);
        }
    }

    #[test]
    fn test_round_trip_program() {
        assert_round_trip(
            "
            var total = 0;
            function add(a, b) { return a + b; }
            for (var i = 0; i < 10; i = i + 1) {
                if (i % 2 == 0) total = add(total, i); else { print i; }
            }
            for (;;) { return; }
            while (total > 0) total = total - 1;
            class Shape { init(name) { this.name = name; } area() { return 0; } }
            class Square extends Shape {
                init(side) { super.init(\"square\"); this.side = side; }
                area() { return this.side ** 2; }
            }
            { var nested = Square(3).area(); print nested; }
            ",
        );
    }

    #[test]
    fn test_round_trip_preserves_tree() {
        let source = "var a = (1 + 2) * -3; print a.b(c) || d; print (x);";

        let first = parse(source);
        let second = parse(&AstPrinter::print_program(&first));

        assert_eq!(
            program_shape(&first),
            vec![
                "(var a (* (group (+ 1.0 2.0)) (- 3.0)))",
                "(print (logical || (call (. a b) [c]) d))",
                "(print (group x))",
            ]
        );
        assert_eq!(program_shape(&first), program_shape(&second));
    }
}
