use crate::ast::{Expr, FunctionDecl, LiteralValue, Stmt};

/// Renders an AST back to Walrus source.
///
/// Operators are printed bare: the tree already encodes precedence, and any
/// parentheses the author wrote survive as `Grouping` nodes. Parsing the
/// output yields the same tree shape.
pub struct AstPrinter;

const INDENT: &str = "    ";

impl AstPrinter {
    pub fn print(expr: &Expr) -> String {
        match expr {
            // ── literals ────────────────────────────────────────────────
            Expr::Literal(lit) => match lit {
                LiteralValue::True => "true".into(),

                LiteralValue::False => "false".into(),

                LiteralValue::Null => "null".into(),

                LiteralValue::Str(s) => format!("\"{}\"", s),

                // f64's Display is the shortest form that reads back exactly
                LiteralValue::Number(n) => n.to_string(),
            },

            Expr::Grouping(inner) => format!("({})", Self::print(inner)),

            // `- -x`, never `--x`
            Expr::Unary { operator, right } => {
                format!("{} {}", operator.lexeme, Self::print(right))
            }

            Expr::Binary {
                left,
                operator,
                right,
            }
            | Expr::Logical {
                left,
                operator,
                right,
            } => format!(
                "{} {} {}",
                Self::print(left),
                operator.lexeme,
                Self::print(right)
            ),

            Expr::Variable { name, .. } => name.lexeme.clone(),

            Expr::Assign { name, value, .. } => {
                format!("{} = {}", name.lexeme, Self::print(value))
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                let args: Vec<String> = arguments.iter().map(Self::print).collect();
                format!("{}({})", Self::print(callee), args.join(", "))
            }

            Expr::Get { object, name } => format!("{}.{}", Self::print(object), name.lexeme),

            Expr::Set {
                object,
                name,
                value,
            } => format!(
                "{}.{} = {}",
                Self::print(object),
                name.lexeme,
                Self::print(value)
            ),

            Expr::This { .. } => "this".into(),

            Expr::Super { method, .. } => format!("super.{}", method.lexeme),
        }
    }

    pub fn print_stmt(stmt: &Stmt) -> String {
        let mut out: String = String::new();
        Self::write_stmt(&mut out, stmt, 0);
        out
    }

    /// One top-level statement per line.
    pub fn print_program(statements: &[Stmt]) -> String {
        statements
            .iter()
            .map(Self::print_stmt)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Writes `stmt` at the cursor; lines it opens are indented one level
    /// deeper than `depth`.
    fn write_stmt(out: &mut String, stmt: &Stmt, depth: usize) {
        match stmt {
            Stmt::Expression(expr) => {
                out.push_str(&Self::print(expr));
                out.push(';');
            }

            Stmt::Print(expr) => {
                out.push_str("print ");
                out.push_str(&Self::print(expr));
                out.push(';');
            }

            Stmt::Var { name, initializer } => {
                out.push_str("var ");
                out.push_str(&name.lexeme);
                if let Some(init) = initializer {
                    out.push_str(" = ");
                    out.push_str(&Self::print(init));
                }
                out.push(';');
            }

            Stmt::Block(statements) => Self::write_block(out, statements, depth),

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                out.push_str("if (");
                out.push_str(&Self::print(condition));
                out.push_str(") ");
                Self::write_stmt(out, then_branch, depth);
                if let Some(else_branch) = else_branch {
                    out.push_str(" else ");
                    Self::write_stmt(out, else_branch, depth);
                }
            }

            Stmt::While { condition, body } => {
                out.push_str("while (");
                out.push_str(&Self::print(condition));
                out.push_str(") ");
                Self::write_stmt(out, body, depth);
            }

            Stmt::Return { value, .. } => match value {
                Some(expr) => {
                    out.push_str("return ");
                    out.push_str(&Self::print(expr));
                    out.push(';');
                }
                None => out.push_str("return;"),
            },

            Stmt::Function(decl) => {
                out.push_str("function ");
                Self::write_function(out, decl, depth);
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                out.push_str("class ");
                out.push_str(&name.lexeme);
                if let Some(superclass) = superclass {
                    out.push_str(" extends ");
                    out.push_str(&Self::print(superclass));
                }
                out.push_str(" {");
                for method in methods {
                    Self::newline(out, depth + 1);
                    Self::write_function(out, method, depth + 1);
                }
                if !methods.is_empty() {
                    Self::newline(out, depth);
                }
                out.push('}');
            }
        }
    }

    fn write_function(out: &mut String, decl: &FunctionDecl, depth: usize) {
        let params: Vec<&str> = decl.params.iter().map(|p| p.lexeme.as_str()).collect();
        out.push_str(&decl.name.lexeme);
        out.push('(');
        out.push_str(&params.join(", "));
        out.push_str(") ");
        Self::write_block(out, &decl.body, depth);
    }

    fn write_block(out: &mut String, statements: &[Stmt], depth: usize) {
        out.push('{');
        for stmt in statements {
            Self::newline(out, depth + 1);
            Self::write_stmt(out, stmt, depth + 1);
        }
        if !statements.is_empty() {
            Self::newline(out, depth);
        }
        out.push('}');
    }

    fn newline(out: &mut String, depth: usize) {
        out.push('\n');
        for _ in 0..depth {
            out.push_str(INDENT);
        }
    }
}
