//! Flat expression tree.
//!
//! Nodes live in an [`ExprArena`] and refer to their children by [`ExprId`].
//! Each child id is referenced by exactly one parent, so the arena always
//! encodes a tree. The analyzer fills in `constant` and `to_watch` after
//! parsing; `to_watch` entries point back into the same arena.

use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::Value;

/// Index into an [`ExprArena`].
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct ExprId(u32);

impl ExprId {
    /// Create an id from a raw arena index.
    #[inline]
    pub const fn new(index: u32) -> Self {
        ExprId(index)
    }

    /// Arena index.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExprId({})", self.0)
    }
}

/// Sub-expressions that must be watched to detect a change of a node.
pub type WatchSet = SmallVec<[ExprId; 2]>;

/// Arithmetic, relational and equality operators.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
}

impl BinaryOp {
    /// Map an operator token to a binary operator.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "+" => Self::Add,
            "-" => Self::Sub,
            "*" => Self::Mul,
            "/" => Self::Div,
            "%" => Self::Mod,
            "<" => Self::Lt,
            ">" => Self::Gt,
            "<=" => Self::LtEq,
            ">=" => Self::GtEq,
            "==" => Self::Eq,
            "!=" => Self::NotEq,
            "===" => Self::StrictEq,
            "!==" => Self::StrictNotEq,
            _ => return None,
        })
    }

    /// Source-level symbol.
    pub const fn as_symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::LtEq => "<=",
            Self::GtEq => ">=",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::StrictEq => "===",
            Self::StrictNotEq => "!==",
        }
    }
}

/// Prefix operators.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum UnaryOp {
    Plus,
    Neg,
    Not,
}

/// Short-circuiting operators.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum LogicalOp {
    And,
    Or,
}

/// Key of an object literal property.
#[derive(Clone, Debug)]
pub enum PropertyKey {
    /// `{a: 1}` or `{'a': 1}`.
    Named(Rc<str>),
    /// `{[expr]: 1}`.
    Computed(ExprId),
}

/// Object literal property.
#[derive(Clone, Debug)]
pub struct Property {
    pub key: PropertyKey,
    pub value: ExprId,
}

/// Expression node variants.
#[derive(Clone, Debug)]
pub enum ExprKind {
    Literal(Value),
    Identifier(Rc<str>),
    Array(Vec<ExprId>),
    Object(Vec<Property>),
    This,
    /// `$locals`
    Locals,
    /// `object.property` (property is an `Identifier`) or `object[property]`.
    Member {
        object: ExprId,
        property: ExprId,
        computed: bool,
    },
    /// Function call. Filter calls have an `Identifier` callee naming the
    /// filter and the piped input as first argument.
    Call {
        callee: ExprId,
        args: Vec<ExprId>,
        filter: bool,
    },
    Assign {
        target: ExprId,
        value: ExprId,
    },
    Unary {
        op: UnaryOp,
        argument: ExprId,
    },
    Binary {
        op: BinaryOp,
        left: ExprId,
        right: ExprId,
    },
    Logical {
        op: LogicalOp,
        left: ExprId,
        right: ExprId,
    },
    Conditional {
        test: ExprId,
        consequent: ExprId,
        alternate: ExprId,
    },
}

/// A node plus its analysis annotations.
#[derive(Clone, Debug)]
pub struct Expr {
    pub kind: ExprKind,
    /// Subtree value never changes across scope states.
    pub constant: bool,
    /// Minimal sub-expressions whose change can change this node.
    pub to_watch: WatchSet,
}

impl Expr {
    /// Unanalyzed node.
    pub fn new(kind: ExprKind) -> Self {
        Expr {
            kind,
            constant: false,
            to_watch: WatchSet::new(),
        }
    }
}

/// Contiguous storage for expression nodes.
#[derive(Clone, Debug, Default)]
pub struct ExprArena {
    exprs: Vec<Expr>,
}

impl ExprArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a node and return its id.
    pub fn alloc_expr(&mut self, expr: Expr) -> ExprId {
        let index = u32::try_from(self.exprs.len()).unwrap_or(u32::MAX);
        self.exprs.push(expr);
        ExprId::new(index)
    }

    #[inline]
    pub fn get_expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    #[inline]
    pub fn get_expr_mut(&mut self, id: ExprId) -> &mut Expr {
        &mut self.exprs[id.index()]
    }

    #[inline]
    pub fn kind(&self, id: ExprId) -> &ExprKind {
        &self.get_expr(id).kind
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }
}

/// A parsed program: statements separated by `;`.
#[derive(Clone, Debug, Default)]
pub struct Ast {
    pub arena: ExprArena,
    pub body: Vec<ExprId>,
}

impl Ast {
    /// True when every statement is constant (an empty program is constant).
    pub fn is_constant(&self) -> bool {
        self.body.iter().all(|&id| self.arena.get_expr(id).constant)
    }

    /// True for a single literal, array literal or object literal statement.
    pub fn is_literal(&self) -> bool {
        match self.body.as_slice() {
            [] => true,
            [only] => matches!(
                self.arena.kind(*only),
                ExprKind::Literal(_) | ExprKind::Array(_) | ExprKind::Object(_)
            ),
            _ => false,
        }
    }

    /// True when the program is a single identifier or member expression.
    pub fn is_assignable(&self) -> bool {
        match self.body.as_slice() {
            [only] => matches!(
                self.arena.kind(*only),
                ExprKind::Identifier(_) | ExprKind::Member { .. }
            ),
            _ => false,
        }
    }
}
