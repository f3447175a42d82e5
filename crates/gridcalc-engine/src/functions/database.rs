//! Database functions
//!
//! All of these share one shape: a database range whose first row is field
//! names, a field selector (name or 1-based index), and a criteria range.
//! Criteria combine with AND across the columns of one row and with OR
//! across rows; each criteria cell reuses the shared criteria sub-language.

use super::FunctionRegistry;
use crate::criteria::{eval_criteria, parse_criteria, Criteria};
use crate::FnCtx;
use gridcalc_core::{ErrorKind, FormulaArgument};

pub(crate) fn register(registry: &mut FunctionRegistry) {
    registry.add("DAVERAGE", 3, Some(3), fn_daverage);
    registry.add("DCOUNT", 3, Some(3), fn_dcount);
    registry.add("DCOUNTA", 3, Some(3), fn_dcounta);
    registry.add("DGET", 3, Some(3), fn_dget);
    registry.add("DMAX", 3, Some(3), fn_dmax);
    registry.add("DMIN", 3, Some(3), fn_dmin);
    registry.add("DPRODUCT", 3, Some(3), fn_dproduct);
    registry.add("DSUM", 3, Some(3), fn_dsum);
}

struct Database {
    headers: Vec<String>,
    records: Vec<Vec<FormulaArgument>>,
}

fn parse_database(arg: &FormulaArgument) -> std::result::Result<Database, FormulaArgument> {
    let rows = match arg.unwrap_cell() {
        FormulaArgument::Matrix { rows, .. } => rows.clone(),
        _ => {
            return Err(FormulaArgument::error_msg(
                ErrorKind::Value,
                "database must be a range with a header row",
            ))
        }
    };
    let mut rows = rows.into_iter();
    let headers: Vec<String> = rows
        .next()
        .unwrap_or_default()
        .iter()
        .map(|h| h.to_text().to_lowercase())
        .collect();
    if headers.is_empty() {
        return Err(FormulaArgument::error_msg(
            ErrorKind::Value,
            "database has no fields",
        ));
    }
    Ok(Database {
        headers,
        records: rows.collect(),
    })
}

fn field_index(
    db: &Database,
    field: &FormulaArgument,
) -> std::result::Result<usize, FormulaArgument> {
    if let Some(n) = field.as_number() {
        let index = n.trunc() as i64;
        if index < 1 || index as usize > db.headers.len() {
            return Err(FormulaArgument::error(ErrorKind::Value));
        }
        return Ok(index as usize - 1);
    }
    let name = field.to_text().to_lowercase();
    db.headers
        .iter()
        .position(|h| *h == name)
        .ok_or_else(|| {
            FormulaArgument::error_msg(ErrorKind::Value, format!("unknown field {name:?}"))
        })
}

/// One criteria row: pairs of database column index and compiled matcher
type CriteriaRow = Vec<(usize, Criteria)>;

fn parse_criteria_rows(
    db: &Database,
    arg: &FormulaArgument,
) -> std::result::Result<Vec<CriteriaRow>, FormulaArgument> {
    let rows = match arg.unwrap_cell() {
        FormulaArgument::Matrix { rows, .. } => rows.clone(),
        _ => {
            return Err(FormulaArgument::error_msg(
                ErrorKind::Value,
                "criteria must be a range with a header row",
            ))
        }
    };
    let mut rows = rows.into_iter();
    let headers: Vec<Option<usize>> = rows
        .next()
        .unwrap_or_default()
        .iter()
        .map(|h| {
            let name = h.to_text().to_lowercase();
            db.headers.iter().position(|field| *field == name)
        })
        .collect();

    let mut out = Vec::new();
    for row in rows {
        let mut compiled = CriteriaRow::new();
        for (cell, column) in row.iter().zip(&headers) {
            if cell.is_empty_value() {
                continue;
            }
            let Some(column) = column else {
                return Err(FormulaArgument::error_msg(
                    ErrorKind::Value,
                    "criteria field not present in database",
                ));
            };
            compiled.push((*column, parse_criteria(&cell.to_text())));
        }
        out.push(compiled);
    }
    Ok(out)
}

/// Values of the selected field across the records matching the criteria
fn matching_values(
    args: &[FormulaArgument],
) -> std::result::Result<Vec<FormulaArgument>, FormulaArgument> {
    let db = parse_database(&args[0])?;
    let field = field_index(&db, &args[1])?;
    let criteria_rows = parse_criteria_rows(&db, &args[2])?;

    let mut out = Vec::new();
    for record in &db.records {
        let matches = criteria_rows.iter().any(|row| {
            row.iter().all(|(column, criteria)| {
                let value = record.get(*column).cloned().unwrap_or_default();
                eval_criteria(&value, criteria)
            })
        });
        if matches {
            out.push(record.get(field).cloned().unwrap_or_default());
        }
    }
    Ok(out)
}

fn numeric(values: &[FormulaArgument]) -> Vec<f64> {
    values.iter().filter_map(|v| v.as_number()).collect()
}

pub fn fn_dsum(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    match matching_values(args) {
        Ok(values) => FormulaArgument::number(numeric(&values).iter().sum()),
        Err(err) => err,
    }
}

pub fn fn_daverage(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    match matching_values(args) {
        Ok(values) => {
            let numbers = numeric(&values);
            if numbers.is_empty() {
                FormulaArgument::error(ErrorKind::Div0)
            } else {
                FormulaArgument::number(numbers.iter().sum::<f64>() / numbers.len() as f64)
            }
        }
        Err(err) => err,
    }
}

pub fn fn_dcount(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    match matching_values(args) {
        Ok(values) => FormulaArgument::number(numeric(&values).len() as f64),
        Err(err) => err,
    }
}

pub fn fn_dcounta(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    match matching_values(args) {
        Ok(values) => FormulaArgument::number(
            values.iter().filter(|v| !v.is_empty_value()).count() as f64,
        ),
        Err(err) => err,
    }
}

pub fn fn_dmax(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    match matching_values(args) {
        Ok(values) => {
            let numbers = numeric(&values);
            if numbers.is_empty() {
                FormulaArgument::number(0.0)
            } else {
                FormulaArgument::number(numbers.iter().copied().fold(f64::MIN, f64::max))
            }
        }
        Err(err) => err,
    }
}

pub fn fn_dmin(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    match matching_values(args) {
        Ok(values) => {
            let numbers = numeric(&values);
            if numbers.is_empty() {
                FormulaArgument::number(0.0)
            } else {
                FormulaArgument::number(numbers.iter().copied().fold(f64::MAX, f64::min))
            }
        }
        Err(err) => err,
    }
}

pub fn fn_dproduct(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    match matching_values(args) {
        Ok(values) => {
            let numbers = numeric(&values);
            if numbers.is_empty() {
                FormulaArgument::number(0.0)
            } else {
                FormulaArgument::number(numbers.iter().product())
            }
        }
        Err(err) => err,
    }
}

/// Exactly one record must match
pub fn fn_dget(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    match matching_values(args) {
        Ok(values) => match values.len() {
            0 => FormulaArgument::error_msg(ErrorKind::Value, "no record matches"),
            1 => values.into_iter().next().unwrap_or_default(),
            _ => FormulaArgument::error_msg(ErrorKind::Num, "more than one record matches"),
        },
        Err(err) => err,
    }
}

#[cfg(test)]
mod tests {
    use crate::Engine;
    use gridcalc_core::{ErrorKind, FormulaArgument, MemoryWorkbook};
    use pretty_assertions::assert_eq;

    /// The orchard database from the classic documentation example
    fn orchard() -> MemoryWorkbook {
        let mut wb = MemoryWorkbook::new();
        let header = ["Tree", "Height", "Age", "Yield"];
        let rows: [(&str, f64, f64, f64); 6] = [
            ("Apple", 18.0, 20.0, 14.0),
            ("Pear", 12.0, 12.0, 10.0),
            ("Cherry", 13.0, 14.0, 9.0),
            ("Apple", 14.0, 15.0, 10.0),
            ("Pear", 9.0, 8.0, 8.0),
            ("Apple", 8.0, 9.0, 6.0),
        ];
        for (i, name) in header.iter().enumerate() {
            let col = (b'A' + i as u8) as char;
            wb.set_text("Sheet1", &format!("{col}1"), name);
        }
        for (r, (tree, height, age, yield_)) in rows.iter().enumerate() {
            let row = r + 2;
            wb.set_text("Sheet1", &format!("A{row}"), tree);
            wb.set_number("Sheet1", &format!("B{row}"), *height);
            wb.set_number("Sheet1", &format!("C{row}"), *age);
            wb.set_number("Sheet1", &format!("D{row}"), *yield_);
        }
        // Criteria block: apples taller than 10, or any pear
        wb.set_text("Sheet1", "F1", "Tree");
        wb.set_text("Sheet1", "G1", "Height");
        wb.set_text("Sheet1", "F2", "Apple");
        wb.set_text("Sheet1", "G2", ">10");
        wb.set_text("Sheet1", "F3", "Pear");
        wb
    }

    fn eval(wb: &MemoryWorkbook, formula: &str) -> FormulaArgument {
        Engine::new(wb).evaluate_formula("Sheet1", formula).unwrap()
    }

    #[test]
    fn test_dsum_or_across_rows() {
        let wb = orchard();
        // Apples over 10 (14 + 10) plus both pears (10 + 8)
        assert_eq!(
            eval(&wb, "=DSUM(A1:D7,\"Yield\",F1:G3)"),
            FormulaArgument::number(42.0)
        );
    }

    #[test]
    fn test_field_by_index() {
        let wb = orchard();
        assert_eq!(
            eval(&wb, "=DSUM(A1:D7,4,F1:G3)"),
            FormulaArgument::number(42.0)
        );
    }

    #[test]
    fn test_daverage_dcount() {
        let wb = orchard();
        assert_eq!(
            eval(&wb, "=DAVERAGE(A1:D7,\"Yield\",F1:G3)"),
            FormulaArgument::number(10.5)
        );
        assert_eq!(
            eval(&wb, "=DCOUNT(A1:D7,\"Age\",F1:G3)"),
            FormulaArgument::number(4.0)
        );
        assert_eq!(
            eval(&wb, "=DCOUNTA(A1:D7,\"Tree\",F1:G3)"),
            FormulaArgument::number(4.0)
        );
    }

    #[test]
    fn test_dmax_dmin() {
        let wb = orchard();
        assert_eq!(
            eval(&wb, "=DMAX(A1:D7,\"Yield\",F1:G3)"),
            FormulaArgument::number(14.0)
        );
        assert_eq!(
            eval(&wb, "=DMIN(A1:D7,\"Yield\",F1:G3)"),
            FormulaArgument::number(8.0)
        );
    }

    #[test]
    fn test_dmax_all_negative() {
        let mut wb = MemoryWorkbook::new();
        wb.set_text("Sheet1", "A1", "Account");
        wb.set_text("Sheet1", "B1", "Balance");
        wb.set_text("Sheet1", "A2", "loan");
        wb.set_number("Sheet1", "B2", -5.0);
        wb.set_text("Sheet1", "A3", "loan");
        wb.set_number("Sheet1", "B3", -3.0);
        wb.set_text("Sheet1", "D1", "Account");
        wb.set_text("Sheet1", "D2", "loan");
        assert_eq!(
            eval(&wb, "=DMAX(A1:B3,\"Balance\",D1:D2)"),
            FormulaArgument::number(-3.0)
        );
        assert_eq!(
            eval(&wb, "=DMIN(A1:B3,\"Balance\",D1:D2)"),
            FormulaArgument::number(-5.0)
        );
    }

    #[test]
    fn test_dproduct() {
        let mut wb = orchard();
        wb.set_text("Sheet1", "I1", "Tree");
        wb.set_text("Sheet1", "I2", "Pear");
        // 10 * 8
        assert_eq!(
            eval(&wb, "=DPRODUCT(A1:D7,\"Yield\",I1:I2)"),
            FormulaArgument::number(80.0)
        );
    }

    #[test]
    fn test_dget_cardinality() {
        let mut wb = orchard();
        // Unique match: the one cherry
        wb.set_text("Sheet1", "I1", "Tree");
        wb.set_text("Sheet1", "I2", "Cherry");
        assert_eq!(
            eval(&wb, "=DGET(A1:D7,\"Yield\",I1:I2)"),
            FormulaArgument::number(9.0)
        );
        assert_eq!(
            eval(&wb, "=DGET(A1:D7,\"Yield\",F1:G3)").error_kind(),
            Some(ErrorKind::Num)
        );
        wb.set_text("Sheet1", "I2", "Walnut");
        assert_eq!(
            eval(&wb, "=DGET(A1:D7,\"Yield\",I1:I2)").error_kind(),
            Some(ErrorKind::Value)
        );
    }

    #[test]
    fn test_unknown_field() {
        let wb = orchard();
        assert_eq!(
            eval(&wb, "=DSUM(A1:D7,\"Weight\",F1:G3)").error_kind(),
            Some(ErrorKind::Value)
        );
    }
}
