//! The built-in function library
//!
//! Dispatch is a static table from normalized (uppercased, legacy-prefix
//! stripped) function name to a handler. Handlers validate their own
//! argument types and always return a [`FormulaArgument`]; evaluation
//! failures become spreadsheet error values, never panics. The registry
//! checks the argument count before dispatch so the handlers can index
//! `args` freely within their declared arity.

pub mod database;
pub mod datetime;
pub mod financial;
pub mod info;
pub mod logical;
pub mod lookup;
pub mod math;
pub mod statistical;
pub mod text;

use crate::kernels::KernelError;
use crate::FnCtx;
use ahash::AHashMap;
use gridcalc_core::{ErrorKind, FormulaArgument};
use once_cell::sync::Lazy;

/// Function implementation signature
pub type FunctionImpl = fn(&FnCtx, &[FormulaArgument]) -> FormulaArgument;

/// Function definition
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
    /// Recalculates on every evaluation (RAND, NOW, TODAY)
    pub volatile: bool,
}

/// Function registry
pub struct FunctionRegistry {
    functions: AHashMap<&'static str, FunctionDef>,
}

static REGISTRY: Lazy<FunctionRegistry> = Lazy::new(FunctionRegistry::new);

impl FunctionRegistry {
    /// The process-wide registry of built-in functions
    pub fn global() -> &'static FunctionRegistry {
        &REGISTRY
    }

    fn new() -> Self {
        let mut registry = Self {
            functions: AHashMap::new(),
        };
        math::register(&mut registry);
        statistical::register(&mut registry);
        financial::register(&mut registry);
        datetime::register(&mut registry);
        text::register(&mut registry);
        logical::register(&mut registry);
        lookup::register(&mut registry);
        info::register(&mut registry);
        database::register(&mut registry);
        registry
    }

    /// Look up a function by normalized name
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name)
    }

    /// All registered names
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub(crate) fn add(
        &mut self,
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        implementation: FunctionImpl,
    ) {
        self.insert(name, min_args, max_args, implementation, false);
    }

    pub(crate) fn add_volatile(
        &mut self,
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        implementation: FunctionImpl,
    ) {
        self.insert(name, min_args, max_args, implementation, true);
    }

    fn insert(
        &mut self,
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        implementation: FunctionImpl,
        volatile: bool,
    ) {
        self.functions.insert(
            name,
            FunctionDef {
                name,
                min_args,
                max_args,
                implementation,
                volatile,
            },
        );
    }
}

/// Uppercase and strip the legacy `_xlfn.` prefix
pub(crate) fn normalize_name(name: &str) -> String {
    let upper = name.trim().to_uppercase();
    upper
        .strip_prefix("_XLFN.")
        .map(str::to_string)
        .unwrap_or(upper)
}

/// Dispatch a function call
pub(crate) fn call(ctx: &FnCtx, name: &str, args: Vec<FormulaArgument>) -> FormulaArgument {
    let name = normalize_name(name);
    let Some(def) = FunctionRegistry::global().get(&name) else {
        return FormulaArgument::error_msg(ErrorKind::Name, format!("unknown function {name}"));
    };
    if args.len() < def.min_args {
        return FormulaArgument::error_msg(
            ErrorKind::Value,
            format!("{name} requires at least {} argument(s)", def.min_args),
        );
    }
    if let Some(max) = def.max_args {
        if args.len() > max {
            return FormulaArgument::error_msg(
                ErrorKind::Value,
                format!("{name} allows at most {max} argument(s)"),
            );
        }
    }
    (def.implementation)(ctx, &args)
}

// === Shared argument helpers ===

/// Coerce an argument to a number or early-return the error value
macro_rules! try_num {
    ($arg:expr) => {
        match $arg.to_number() {
            Ok(n) => n,
            Err(err) => return err,
        }
    };
}

/// Coerce an argument to a boolean or early-return the error value
macro_rules! try_bool {
    ($arg:expr) => {
        match $arg.to_bool() {
            Ok(b) => b,
            Err(err) => return err,
        }
    };
}

pub(crate) use {try_bool, try_num};

pub(crate) fn kernel_error(err: KernelError) -> FormulaArgument {
    FormulaArgument::error_msg(ErrorKind::Num, err.to_string())
}

/// Gather numeric values across scalar and range arguments
///
/// Direct scalar arguments are coerced (so `SUM("3")` works); values inside
/// ranges and arrays count only when they are already numeric, matching
/// spreadsheet aggregation rules. Any error value aborts the collection.
pub(crate) fn collect_numeric(
    args: &[FormulaArgument],
) -> std::result::Result<Vec<f64>, FormulaArgument> {
    let mut out = Vec::new();
    for arg in args {
        match arg.unwrap_cell() {
            FormulaArgument::Matrix { .. } | FormulaArgument::List { .. } => {
                for value in arg.flatten() {
                    if value.is_error() {
                        return Err(value.unwrap_cell().clone());
                    }
                    if let Some(n) = value.as_number() {
                        out.push(n);
                    }
                }
            }
            FormulaArgument::Empty => {}
            _ => out.push(arg.to_number()?),
        }
    }
    Ok(out)
}

/// Interpret an argument as a rectangular numeric matrix
///
/// Scalars become a 1×1 matrix. Non-numeric or ragged content is a
/// `#VALUE!` error.
pub(crate) fn numeric_matrix(
    arg: &FormulaArgument,
) -> std::result::Result<Vec<Vec<f64>>, FormulaArgument> {
    match arg.unwrap_cell() {
        FormulaArgument::Matrix { rows, .. } => {
            let width = rows.first().map(|r| r.len()).unwrap_or(0);
            if width == 0 || rows.iter().any(|r| r.len() != width) {
                return Err(FormulaArgument::error_msg(
                    ErrorKind::Value,
                    "matrix argument must be rectangular and non-empty",
                ));
            }
            rows.iter()
                .map(|row| row.iter().map(|v| v.to_number()).collect())
                .collect()
        }
        _ => Ok(vec![vec![arg.to_number()?]]),
    }
}

/// Wrap a numeric matrix back into a formula argument
pub(crate) fn matrix_value(rows: Vec<Vec<f64>>) -> FormulaArgument {
    FormulaArgument::matrix(
        rows.into_iter()
            .map(|row| row.into_iter().map(FormulaArgument::number).collect())
            .collect(),
    )
}
