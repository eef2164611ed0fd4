//! The `$parse` service.
//!
//! Turns expression text into a cached [`Expression`]. A leading `::` marks
//! a one-time binding. The watch delegate is chosen here so scopes only
//! have to dispatch on it.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tessel_ir::{Result, Value};
use tracing::{debug, trace};

use crate::compile::compile;
use crate::expression::{Expression, ExpressionData, WatchDelegate};
use crate::{analyze, FilterRegistry};

/// Expression parser with a per-source-text cache.
///
/// The cache is dropped whenever the filter registry changes, so a filter
/// registered or replaced after a parse is seen by the next parse.
#[derive(Clone, Default)]
pub struct Parser {
    filters: FilterRegistry,
    cache: Rc<RefCell<FxHashMap<Rc<str>, Expression>>>,
    /// Filter generation the cached entries were compiled against.
    filters_seen: Rc<Cell<u64>>,
}

impl Parser {
    pub fn new(filters: FilterRegistry) -> Self {
        let filters_seen = Rc::new(Cell::new(filters.generation()));
        Parser {
            filters,
            cache: Rc::default(),
            filters_seen,
        }
    }

    pub fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    /// Parse, analyze and compile `text`, reusing a cached result for
    /// identical (trimmed) source.
    pub fn parse(&self, text: &str) -> Result<Expression> {
        let key = text.trim();
        let generation = self.filters.generation();
        if self.filters_seen.replace(generation) != generation {
            debug!(generation, "filters changed, clearing expression cache");
            self.cache.borrow_mut().clear();
        }
        if let Some(cached) = self.cache.borrow().get(key) {
            trace!(source = key, "expression cache hit");
            return Ok(cached.clone());
        }

        let (one_time, source) = match key.strip_prefix("::") {
            Some(rest) => (true, rest),
            None => (false, key),
        };
        let mut ast = tessel_parse::parse(source)?;
        analyze(&mut ast, &self.filters);
        let compiled = compile(&ast, source, &self.filters)?;

        let delegate = if compiled.constant {
            WatchDelegate::Constant
        } else if one_time {
            if compiled.literal {
                WatchDelegate::OneTimeLiteral
            } else {
                WatchDelegate::OneTime
            }
        } else if compiled.inputs.is_empty() {
            WatchDelegate::None
        } else {
            WatchDelegate::Inputs
        };

        let expression = Expression(Rc::new(ExpressionData {
            source: Rc::from(source),
            eval: compiled.eval,
            assign: compiled.assign,
            inputs: compiled.inputs,
            constant: compiled.constant,
            literal: compiled.literal,
            one_time,
            delegate,
        }));
        trace!(source = key, ?delegate, "compiled expression");
        self.cache
            .borrow_mut()
            .insert(Rc::from(key), expression.clone());
        Ok(expression)
    }

    /// Wrap a native closure as an expression (never cached).
    pub fn parse_fn(&self, func: impl Fn(&Value, &Value) -> Result<Value> + 'static) -> Expression {
        Expression::from_fn(func)
    }

    /// Number of cached expressions.
    pub fn cache_len(&self) -> usize {
        self.cache.borrow().len()
    }
}

impl std::fmt::Debug for Parser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("filters", &self.filters)
            .field("cached", &self.cache_len())
            .finish()
    }
}
