//! # gridcalc-engine
//!
//! The formula evaluation engine: a token-stream expression evaluator, a
//! reference resolver with iterative circular-reference handling, a criteria
//! sub-language for the conditional aggregation functions, and the built-in
//! function library.
//!
//! The engine borrows a [`WorkbookStore`] and never mutates it; every
//! evaluation runs against a fresh [`context::CalcContext`] so concurrent
//! evaluations of different cells do not interfere.
//!
//! ## Example
//!
//! ```rust
//! use gridcalc_core::{FormulaArgument, MemoryWorkbook};
//! use gridcalc_engine::Engine;
//!
//! let mut wb = MemoryWorkbook::new();
//! wb.set_number("Sheet1", "A1", 2.0);
//! wb.set_number("Sheet1", "A2", 3.0);
//!
//! let engine = Engine::new(&wb);
//! let value = engine.evaluate_formula("Sheet1", "=SUM(A1:A2)*10").unwrap();
//! assert_eq!(value, FormulaArgument::number(50.0));
//! ```

pub mod context;
pub mod criteria;
pub mod evaluator;
pub mod functions;
pub mod kernels;
pub mod resolver;

use chrono::NaiveDateTime;
use gridcalc_core::{FormulaArgument, WorkbookStore};
use gridcalc_lexer::tokenize;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::sync::Mutex;

use context::CalcContext;

/// Errors surfaced to the embedder rather than into the cell
///
/// Everything a formula does wrong at *evaluation* time (bad types, division
/// by zero, unknown names) becomes a spreadsheet error value; only formulas
/// that are not well-formed expressions at all are rejected here.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid formula: {0}")]
    InvalidFormula(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Time source for NOW/TODAY, injectable for deterministic tests
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Wall-clock time in the local timezone
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// A clock frozen at a fixed instant
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// The formula evaluation engine
///
/// Holds the workbook being evaluated plus the evaluation policy: the
/// circular-reference iteration limit, the time source, and the random
/// number generator used by RAND/RANDBETWEEN.
pub struct Engine<'w> {
    store: &'w dyn WorkbookStore,
    max_iterations: u32,
    clock: Box<dyn Clock>,
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl<'w> Engine<'w> {
    pub fn new(store: &'w dyn WorkbookStore) -> Self {
        Self {
            store,
            max_iterations: 0,
            clock: Box::new(SystemClock),
            rng: Mutex::new(Box::new(StdRng::from_entropy())),
        }
    }

    /// Set the iteration limit for circular references; 0 (the default)
    /// means a circular chain contributes its cached value immediately
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_rng(mut self, rng: Box<dyn RngCore + Send>) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    pub fn store(&self) -> &'w dyn WorkbookStore {
        self.store
    }

    pub(crate) fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    pub(crate) fn random(&self) -> f64 {
        self.rng.lock().unwrap().gen::<f64>()
    }

    pub(crate) fn random_range(&self, low: i64, high: i64) -> i64 {
        self.rng.lock().unwrap().gen_range(low..=high)
    }

    /// Evaluate the formula stored in a cell; a cell without a formula
    /// yields its stored value
    pub fn evaluate_cell(&self, sheet: &str, cell: &str) -> Result<FormulaArgument> {
        match self.store.cell_formula(sheet, cell) {
            Some(formula) => {
                let calc = CalcContext::new(sheet, cell, self.max_iterations);
                self.eval_formula_in(&calc, sheet, &formula)
            }
            None => Ok(context::read_stored_value(self.store, sheet, cell)),
        }
    }

    /// Evaluate ad-hoc formula text against a sheet, as if typed into an
    /// unoccupied cell
    pub fn evaluate_formula(&self, sheet: &str, text: &str) -> Result<FormulaArgument> {
        let calc = CalcContext::new(sheet, "", self.max_iterations);
        self.eval_formula_in(&calc, sheet, text)
    }

    pub(crate) fn eval_formula_in(
        &self,
        calc: &CalcContext,
        sheet: &str,
        text: &str,
    ) -> Result<FormulaArgument> {
        let body = text.strip_prefix('=').unwrap_or(text);
        let tokens = tokenize(body);
        if tokens.is_empty() {
            return Err(EngineError::InvalidFormula("empty formula".to_string()));
        }
        let ctx = FnCtx {
            engine: self,
            calc,
            sheet,
        };
        evaluator::eval_tokens(&tokens, &ctx)
    }
}

/// Per-call evaluation context handed to the resolver and function library
pub struct FnCtx<'a> {
    pub engine: &'a Engine<'a>,
    pub calc: &'a CalcContext,
    /// Sheet the formula under evaluation belongs to; unqualified
    /// references resolve against it
    pub sheet: &'a str,
}

impl<'a> FnCtx<'a> {
    pub fn store(&self) -> &'a dyn WorkbookStore {
        self.engine.store
    }
}
