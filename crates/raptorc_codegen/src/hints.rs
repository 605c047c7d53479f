use raptorc_ast::visitor::{Visitor, visit_body};
use raptorc_ast::{Expr, Function, Node, Statement};

/// Facts about one function or script body, gathered before emission.
///
/// Analysis stops at nested function boundaries: their bodies get their
/// own hints when they are generated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptimizationHints {
    pub has_nested_functions: bool,
    pub uses_this: bool,
    /// `var` and function declaration names, first occurrence order.
    pub declared_variables: Vec<String>,
    /// Function declarations to instantiate at body start.
    pub hoisted_functions: Vec<Node<Function>>,
}

impl OptimizationHints {
    pub fn analyze(body: &[Node<Statement>]) -> Self {
        let mut hints = Self::default();
        visit_body(body, &mut hints);
        hints
    }

    fn declare(&mut self, name: &str) {
        if !self.declared_variables.iter().any(|existing| existing == name) {
            self.declared_variables.push(name.to_string());
        }
    }
}

impl Visitor for OptimizationHints {
    fn visit_statement(&mut self, stmt: &Node<Statement>) {
        match stmt.as_ref() {
            Statement::Var { name, .. } => self.declare(name),
            Statement::Function(func) => {
                if let Some(name) = &func.as_ref().name {
                    self.declare(name);
                }
                self.hoisted_functions.push(func.clone());
            }
            _ => {}
        }
    }

    fn visit_expression(&mut self, expr: &Node<Expr>) {
        if matches!(expr.as_ref(), Expr::This) {
            self.uses_this = true;
        }
    }

    fn visit_function(&mut self, _func: &Node<Function>) {
        self.has_nested_functions = true;
    }

    fn descend_into_functions(&self) -> bool {
        false
    }
}
