//! The pretty printer: AST back to nicely indented source code. The output
//! reflects every rewrite the machine has applied, and any printed source
//! reparses to the same AST (return-value residuals excepted, as they are
//! not source syntax and print as nothing). The printer never touches the
//! store.

use crate::ast::{
    BoolExpr, ClassDecl, CtorDecl, Expr, MethodDecl, Program, Rhs, Stmt,
};

/// Pretty-print a full program, class declarations first.
pub fn program_to_string(program: &Program) -> String {
    let mut printer = Printer::new();
    printer.program(program);
    printer.out
}

/// Pretty-print a single statement, e.g. a machine's residual program.
pub fn stmt_to_string(stmt: &Stmt) -> String {
    let mut printer = Printer::new();
    printer.stmt(stmt);
    printer.out
}

/// Accumulates output and tracks the current indention. One unit of
/// indention per enclosing block-like construct.
struct Printer {
    indention_list: Vec<&'static str>,
    out: String,
}

impl Printer {
    fn new() -> Self {
        Self {
            indention_list: Vec::new(),
            out: String::new(),
        }
    }

    fn indent(&mut self) {
        self.indention_list.push("  ");
    }

    fn unindent(&mut self) {
        self.indention_list.pop();
    }

    fn indention(&self) -> String {
        self.indention_list.concat()
    }

    fn print(&mut self, text: &str) {
        self.out.push_str(text);
    }

    /// Print a parenthesised name list, e.g. a parameter or argument list.
    fn name_list(&mut self, names: &[String]) {
        self.print("(");
        self.print(&names.join(", "));
        self.print(")");
    }

    fn program(&mut self, program: &Program) {
        for class in &program.classes {
            let indention = self.indention();
            self.print(&indention);
            self.class_decl(class);
            self.print("\n\n");
        }
        self.stmt(&program.initial);
        self.print("\n");
    }

    fn class_decl(&mut self, class: &ClassDecl) {
        self.print("class ");
        self.print(&class.name);
        self.print(" is begin\n");
        self.indent();

        for var in &class.vars {
            let indention = self.indention();
            self.print(&indention);
            self.print("var ");
            self.print(var);
            self.print(";\n");
        }
        // Separate member variables from the constructor with an empty line
        if !class.vars.is_empty() {
            self.print("\n");
        }

        let indention = self.indention();
        self.print(&indention);
        self.ctor_decl(&class.ctor);
        self.print("\n");

        for method in &class.methods {
            let indention = self.indention();
            self.print("\n");
            self.print(&indention);
            self.method_decl(method);
            self.print("\n");
        }

        self.unindent();
        let indention = self.indention();
        self.print(&indention);
        self.print("end;");
    }

    fn ctor_decl(&mut self, ctor: &CtorDecl) {
        self.print("constructor");
        self.name_list(&ctor.params);
        self.print(" is ");
        self.stmt(&ctor.body);
        self.print(";");
    }

    fn method_decl(&mut self, method: &MethodDecl) {
        self.print("method ");
        self.print(&method.name);
        self.name_list(&method.params);
        self.print(" is ");
        self.stmt(&method.body);
        self.print(";");
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Assign(target, rhs) => {
                self.print(target);
                self.print(" := ");
                match rhs {
                    Rhs::Expr(expr) => self.expr(expr),
                    Rhs::MethodScoped(body) => self.scoped("[", body, "]"),
                }
            }
            Stmt::Skip => self.print("skip"),
            Stmt::Return(var) => {
                self.print("return ");
                self.print(var);
            }
            Stmt::Block { vars, body } => {
                self.print("begin\n");
                self.indent();

                for var in vars {
                    let indention = self.indention();
                    self.print(&indention);
                    self.print("var ");
                    self.print(var);
                    self.print(";\n");
                }
                if !vars.is_empty() && !body.is_empty() {
                    self.print("\n");
                }

                self.sequence(body);

                self.unindent();
                let indention = self.indention();
                self.print(&indention);
                self.print("end");
            }
            Stmt::If {
                cond,
                then_stmt,
                else_stmt,
            } => {
                self.print("if ");
                self.bool_expr(cond);
                self.print(" then\n");
                self.indent();
                let indention = self.indention();
                self.print(&indention);
                self.stmt(then_stmt);
                self.unindent();

                let indention = self.indention();
                self.print("\n");
                self.print(&indention);
                self.print("else\n");
                self.indent();
                let indention = self.indention();
                self.print(&indention);
                self.stmt(else_stmt);
                self.unindent();
            }
            Stmt::While { cond, body } => {
                self.print("while ");
                self.bool_expr(cond);
                self.print(" do ");
                self.stmt(body);
            }
            Stmt::Sequence(stmts) => self.sequence(stmts),
            Stmt::Expr(expr) => self.expr(expr),
            Stmt::BlockScoped(body) => self.scoped("{", body, "}"),
            Stmt::MethodScoped(body) => self.scoped("[", body, "]"),
            // Not source syntax; prints as nothing
            Stmt::ReturnValue(_) => {}
        }
    }

    /// Print the statements of a sequence, one per line, with semicolons
    /// only between statements.
    fn sequence(&mut self, stmts: &[Stmt]) {
        if let Some((last, rest)) = stmts.split_last() {
            for stmt in rest {
                let indention = self.indention();
                self.print(&indention);
                self.stmt(stmt);
                self.print(";\n");
            }
            let indention = self.indention();
            self.print(&indention);
            self.stmt(last);
            self.print("\n");
        }
    }

    /// Print a scoped statement. A sequence body goes multi-line with the
    /// brackets on their own lines; anything else stays inline.
    fn scoped(&mut self, open: &str, body: &Stmt, close: &str) {
        if let Stmt::Sequence(stmts) = body {
            self.print(open);
            self.print("\n");
            self.indent();
            self.sequence(stmts);
            self.unindent();
            let indention = self.indention();
            self.print(&indention);
            self.print(close);
        } else {
            self.print(open);
            self.print(" ");
            self.stmt(body);
            self.print(" ");
            self.print(close);
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Var(var) => self.print(var),
            Expr::New { class, args } => {
                self.print("new ");
                self.print(class);
                self.name_list(args);
            }
            Expr::Call {
                target,
                method,
                args,
            } => {
                self.print(target);
                self.print(".");
                self.print(method);
                self.name_list(args);
            }
        }
    }

    fn bool_expr(&mut self, cond: &BoolExpr) {
        match cond {
            BoolExpr::Eq(var1, var2) => {
                self.print(var1);
                self.print(" = ");
                self.print(var2);
            }
            BoolExpr::Neq(var1, var2) => {
                self.print(var1);
                self.print(" != ");
                self.print(var2);
            }
        }
    }
}
