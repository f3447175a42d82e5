//! The workbook storage interface consumed by the engine
//!
//! The engine never mutates the store during evaluation; all access is
//! synchronous reads. Cell payloads are exchanged as raw text plus a
//! declared type, leaving value parsing to the caller.

use crate::address::parse_cell_name;
use ahash::AHashMap;

/// Declared type of a stored cell value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellType {
    Number,
    Text,
    Boolean,
    InlineText,
    SharedText,
    /// No value stored
    #[default]
    Unset,
}

impl CellType {
    /// True for all of the textual storage flavors
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            CellType::Text | CellType::InlineText | CellType::SharedText
        )
    }
}

/// Read-only workbook interface the engine evaluates against
pub trait WorkbookStore {
    /// Raw stored value and declared type of a cell (A1-style address)
    fn cell_value(&self, sheet: &str, cell: &str) -> (String, CellType);

    /// The formula text stored in a cell, if any
    fn cell_formula(&self, sheet: &str, cell: &str) -> Option<String>;

    /// Target reference text of a defined name visible from `sheet`
    fn defined_name(&self, name: &str, sheet: &str) -> Option<String>;

    /// Zero-based position of a sheet in the workbook's sheet order
    fn sheet_index(&self, name: &str) -> Option<usize>;

    /// All sheet names in workbook order
    fn sheet_names(&self) -> Vec<String>;

    /// Used extent of a sheet as `(rows, cols)`; full-column and full-row
    /// ranges are expanded over this region only
    fn used_dimensions(&self, sheet: &str) -> (i32, i32);
}

#[derive(Debug, Clone, Default)]
struct StoredCell {
    raw: String,
    cell_type: CellType,
    formula: Option<String>,
}

#[derive(Debug, Default)]
struct Sheet {
    cells: AHashMap<(i32, i32), StoredCell>,
    max_row: i32,
    max_col: i32,
}

/// In-memory workbook store
///
/// The reference [`WorkbookStore`] implementation, used by the test suites
/// and by embedders that have no backing file.
#[derive(Debug, Default)]
pub struct MemoryWorkbook {
    sheet_order: Vec<String>,
    sheets: AHashMap<String, Sheet>,
    // name -> (scope sheet or None for workbook scope, target text)
    defined_names: Vec<(String, Option<String>, String)>,
}

impl MemoryWorkbook {
    /// Create a workbook with a single sheet named `Sheet1`
    pub fn new() -> Self {
        let mut wb = Self::default();
        wb.add_sheet("Sheet1");
        wb
    }

    /// Create a workbook with no sheets
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add a sheet; no-op if the name already exists
    pub fn add_sheet(&mut self, name: &str) {
        if !self.sheets.contains_key(name) {
            self.sheet_order.push(name.to_string());
            self.sheets.insert(name.to_string(), Sheet::default());
        }
    }

    fn set_cell(&mut self, sheet: &str, cell: &str, stored: StoredCell) {
        let Ok((col, row)) = parse_cell_name(&cell.replace('$', "").to_uppercase()) else {
            return;
        };
        self.add_sheet(sheet);
        let sheet = self.sheets.get_mut(sheet).unwrap();
        sheet.max_row = sheet.max_row.max(row);
        sheet.max_col = sheet.max_col.max(col);
        sheet.cells.insert((col, row), stored);
    }

    pub fn set_number(&mut self, sheet: &str, cell: &str, value: f64) {
        self.set_cell(
            sheet,
            cell,
            StoredCell {
                raw: crate::value::format_number(value),
                cell_type: CellType::Number,
                formula: None,
            },
        );
    }

    pub fn set_text(&mut self, sheet: &str, cell: &str, value: &str) {
        self.set_cell(
            sheet,
            cell,
            StoredCell {
                raw: value.to_string(),
                cell_type: CellType::Text,
                formula: None,
            },
        );
    }

    pub fn set_bool(&mut self, sheet: &str, cell: &str, value: bool) {
        self.set_cell(
            sheet,
            cell,
            StoredCell {
                raw: if value { "TRUE" } else { "FALSE" }.to_string(),
                cell_type: CellType::Boolean,
                formula: None,
            },
        );
    }

    /// Store a formula; a leading `=` is accepted and preserved as given.
    /// The stored raw value (if previously set) remains the cell's cached
    /// value until the caller writes a new one.
    pub fn set_formula(&mut self, sheet: &str, cell: &str, formula: &str) {
        let existing = self.lookup(sheet, cell).cloned().unwrap_or_default();
        self.set_cell(
            sheet,
            cell,
            StoredCell {
                formula: Some(formula.to_string()),
                ..existing
            },
        );
    }

    /// Define a workbook-scoped name
    pub fn define_name(&mut self, name: &str, target: &str) {
        self.defined_names
            .push((name.to_string(), None, target.to_string()));
    }

    /// Define a sheet-scoped name
    pub fn define_name_for_sheet(&mut self, name: &str, sheet: &str, target: &str) {
        self.defined_names
            .push((name.to_string(), Some(sheet.to_string()), target.to_string()));
    }

    fn lookup(&self, sheet: &str, cell: &str) -> Option<&StoredCell> {
        let (col, row) = parse_cell_name(&cell.replace('$', "").to_uppercase()).ok()?;
        self.sheets.get(sheet)?.cells.get(&(col, row))
    }
}

impl WorkbookStore for MemoryWorkbook {
    fn cell_value(&self, sheet: &str, cell: &str) -> (String, CellType) {
        match self.lookup(sheet, cell) {
            Some(stored) => (stored.raw.clone(), stored.cell_type),
            None => (String::new(), CellType::Unset),
        }
    }

    fn cell_formula(&self, sheet: &str, cell: &str) -> Option<String> {
        self.lookup(sheet, cell)?.formula.clone()
    }

    fn defined_name(&self, name: &str, sheet: &str) -> Option<String> {
        // Sheet-scoped names shadow workbook-scoped ones
        let mut workbook_scoped = None;
        for (n, scope, target) in &self.defined_names {
            if !n.eq_ignore_ascii_case(name) {
                continue;
            }
            match scope {
                Some(s) if s == sheet => return Some(target.clone()),
                None => workbook_scoped = Some(target.clone()),
                _ => {}
            }
        }
        workbook_scoped
    }

    fn sheet_index(&self, name: &str) -> Option<usize> {
        self.sheet_order.iter().position(|s| s == name)
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheet_order.clone()
    }

    fn used_dimensions(&self, sheet: &str) -> (i32, i32) {
        self.sheets
            .get(sheet)
            .map(|s| (s.max_row, s.max_col))
            .unwrap_or((0, 0))
    }
}
