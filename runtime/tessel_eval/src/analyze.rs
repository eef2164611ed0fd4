//! Constant and watch-set analysis.
//!
//! A bottom-up pass filling in [`Expr::constant`] and [`Expr::to_watch`] for
//! every node reachable from the program body. `to_watch` is the smallest
//! set of sub-expressions whose values determine the node's value; nodes that
//! cannot be decomposed watch themselves.
//!
//! [`Expr::constant`]: tessel_ir::Expr
//! [`Expr::to_watch`]: tessel_ir::Expr

use smallvec::smallvec;
use tessel_ir::{Ast, ExprArena, ExprId, ExprKind, PropertyKey, WatchSet};
use tessel_stack::ensure_sufficient_stack;

use crate::FilterRegistry;

/// Annotate every node of `ast` in place.
pub fn analyze(ast: &mut Ast, filters: &FilterRegistry) {
    let body = ast.body.clone();
    let mut analyzer = Analyzer {
        arena: &mut ast.arena,
        filters,
    };
    for id in body {
        analyzer.visit(id);
    }
}

struct Analyzer<'a> {
    arena: &'a mut ExprArena,
    filters: &'a FilterRegistry,
}

impl Analyzer<'_> {
    fn visit(&mut self, id: ExprId) -> bool {
        ensure_sufficient_stack(|| self.visit_inner(id))
    }

    /// Analyze `id`, returning its `constant` flag.
    fn visit_inner(&mut self, id: ExprId) -> bool {
        let kind = self.arena.kind(id).clone();
        let (constant, to_watch): (bool, WatchSet) = match kind {
            ExprKind::Literal(_) => (true, WatchSet::new()),
            ExprKind::Identifier(_) => (false, smallvec![id]),
            ExprKind::This | ExprKind::Locals => (false, WatchSet::new()),
            ExprKind::Array(elements) => self.union(&elements),
            ExprKind::Object(properties) => {
                let mut children = Vec::with_capacity(properties.len() * 2);
                for property in &properties {
                    if let PropertyKey::Computed(key) = property.key {
                        children.push(key);
                    }
                    children.push(property.value);
                }
                self.union(&children)
            }
            ExprKind::Member {
                object,
                property,
                computed,
            } => {
                let object_constant = self.visit(object);
                let property_constant = if computed {
                    self.visit(property)
                } else {
                    true
                };
                (object_constant && property_constant, smallvec![id])
            }
            ExprKind::Call {
                callee,
                args,
                filter,
            } => {
                let stateless = filter && self.is_stateless_filter(callee);
                let (args_constant, args_watch) = self.union(&args);
                if stateless {
                    (args_constant, args_watch)
                } else {
                    if !filter {
                        self.visit(callee);
                    }
                    (false, smallvec![id])
                }
            }
            ExprKind::Assign { target, value } => {
                let target_constant = self.visit(target);
                let value_constant = self.visit(value);
                (target_constant && value_constant, smallvec![id])
            }
            ExprKind::Unary { argument, .. } => {
                let constant = self.visit(argument);
                (constant, self.arena.get_expr(argument).to_watch.clone())
            }
            ExprKind::Binary { left, right, .. } => self.union(&[left, right]),
            ExprKind::Logical { left, right, .. } => {
                let (constant, _) = self.union(&[left, right]);
                (constant, smallvec![id])
            }
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                let (constant, _) = self.union(&[test, consequent, alternate]);
                (constant, smallvec![id])
            }
        };

        let expr = self.arena.get_expr_mut(id);
        expr.constant = constant;
        expr.to_watch = if constant { WatchSet::new() } else { to_watch };
        constant
    }

    /// Visit `children`; constant if all are, watching the union of their sets.
    fn union(&mut self, children: &[ExprId]) -> (bool, WatchSet) {
        let mut constant = true;
        let mut to_watch = WatchSet::new();
        for &child in children {
            constant &= self.visit(child);
            to_watch.extend_from_slice(&self.arena.get_expr(child).to_watch);
        }
        (constant, to_watch)
    }

    fn is_stateless_filter(&self, callee: ExprId) -> bool {
        match self.arena.kind(callee) {
            ExprKind::Identifier(name) => !self.filters.is_stateful(name),
            _ => false,
        }
    }
}
