use crate::spreadsheet::cell::CellValue;

static EMPTY: CellValue = CellValue::Empty;

/// The raw cell contents of one sheet, addressed by 0-based row and column.
///
/// Rows may have different lengths; cells beyond a row's end read as empty.
/// A grid is immutable once built.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CellGrid {
    rows: Vec<Vec<CellValue>>,
}

impl CellGrid {
    /// Builds a grid, dropping trailing empty cells from every row.
    pub fn new(rows: Vec<Vec<CellValue>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|mut row| {
                while row.last().is_some_and(CellValue::is_empty) {
                    row.pop();
                }
                row
            })
            .collect();
        Self { rows }
    }

    /// Number of rows, including blank ones.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Width of the widest row.
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Returns true if no row holds a value.
    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(Vec::is_empty)
    }

    /// Cells of a row; out-of-range rows are empty.
    pub fn row(&self, row: usize) -> &[CellValue] {
        self.rows.get(row).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Gets the cell at (row, col); positions outside the grid read as empty.
    pub fn get(&self, row: usize, col: usize) -> &CellValue {
        self.rows.get(row).and_then(|cells| cells.get(col)).unwrap_or(&EMPTY)
    }

    /// Non-empty cells of a row with their column indexes.
    pub fn populated(&self, row: usize) -> impl Iterator<Item = (usize, &CellValue)> + '_ {
        self.row(row)
            .iter()
            .enumerate()
            .filter(|(_, cell)| !cell.is_empty())
    }

    /// Returns true if every cell of the row is empty.
    pub fn is_blank_row(&self, row: usize) -> bool {
        self.row(row).iter().all(CellValue::is_empty)
    }

    /// First and last populated column of a row.
    pub fn column_span(&self, row: usize) -> Option<(usize, usize)> {
        let mut populated = self.populated(row).map(|(col, _)| col);
        let first = populated.next()?;
        Some((first, populated.last().unwrap_or(first)))
    }
}

/// Builds a [`CellGrid`] from row literals; use `CellValue::Empty` for holes.
#[cfg(test)]
macro_rules! grid {
    ($([$($cell:expr),* $(,)?]),* $(,)?) => {
        $crate::spreadsheet::grid::CellGrid::new(vec![
            $(vec![$($crate::spreadsheet::cell::CellValue::from($cell)),*]),*
        ])
    };
}

#[cfg(test)]
pub(crate) use grid;
