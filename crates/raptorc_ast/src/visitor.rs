use crate::nodes::*;

/// A read-only AST visitor.
pub trait Visitor {
    fn visit_statement(&mut self, _stmt: &Node<Statement>) {}
    fn visit_expression(&mut self, _expr: &Node<Expr>) {}
    fn visit_function(&mut self, _func: &Node<Function>) {}

    /// Whether traversal continues into the bodies of nested functions.
    fn descend_into_functions(&self) -> bool {
        true
    }
}

/// Traverse the AST using a read-only visitor.
pub fn visit(program: &Program, visitor: &mut impl Visitor) {
    visit_body(&program.statements, visitor);
}

/// Traverse a statement list (a script or function body).
pub fn visit_body(statements: &[Node<Statement>], visitor: &mut impl Visitor) {
    for stmt in statements {
        visit_statement(stmt, visitor);
    }
}

fn visit_statement(stmt: &Node<Statement>, visitor: &mut impl Visitor) {
    visitor.visit_statement(stmt);
    match stmt.as_ref() {
        Statement::Var {
            init: Some(expr), ..
        } => {
            visit_expression(expr, visitor);
        }
        Statement::Function(func) => {
            visit_function(func, visitor);
        }
        Statement::Return(Some(expr)) => {
            visit_expression(expr, visitor);
        }
        Statement::If {
            cond,
            then_branch,
            else_branch,
        } => {
            visit_expression(cond, visitor);
            visit_statement(then_branch, visitor);
            if let Some(else_branch) = else_branch {
                visit_statement(else_branch, visitor);
            }
        }
        Statement::While { cond, body } => {
            visit_expression(cond, visitor);
            visit_statement(body, visitor);
        }
        Statement::Block(statements) => {
            visit_body(statements, visitor);
        }
        Statement::Expr(expr) => {
            visit_expression(expr, visitor);
        }
        _ => {}
    }
}

fn visit_expression(expr: &Node<Expr>, visitor: &mut impl Visitor) {
    visitor.visit_expression(expr);
    match expr.as_ref() {
        Expr::Assign { value, .. } => {
            visit_expression(value, visitor);
        }
        Expr::Unary { expr, .. } => {
            visit_expression(expr, visitor);
        }
        Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
            visit_expression(left, visitor);
            visit_expression(right, visitor);
        }
        Expr::Call { callee, args } => {
            visit_expression(callee, visitor);
            for arg in args {
                visit_expression(arg, visitor);
            }
        }
        Expr::Function(func) => {
            visit_function(func, visitor);
        }
        _ => {}
    }
}

fn visit_function(func: &Node<Function>, visitor: &mut impl Visitor) {
    visitor.visit_function(func);
    if visitor.descend_into_functions() {
        visit_body(&func.as_ref().body, visitor);
    }
}
