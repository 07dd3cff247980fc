use crate::spreadsheet::cell::CellValue;
use crate::table::column::coerce;
use crate::table::column::ColumnType;
use serde::ser::SerializeMap;
use serde::Serialize;
use serde::Serializer;

/// One output row: column names mapped to values, in column order.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedRecord {
    fields: Vec<(String, CellValue)>,
}

impl NormalizedRecord {
    /// Value of a column, if the record has it.
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.fields.iter().find(|(name, _)| name == column).map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl Serialize for NormalizedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// A consolidated table: named columns and rows of equal width.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Table {
    /// Builds a table, padding or cutting every row to the column count.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, CellValue::Empty);
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Value of a named column in a given row.
    pub fn value(&self, row: usize, column: &str) -> Option<&CellValue> {
        let col = self.column_index(column)?;
        self.rows.get(row).and_then(|cells| cells.get(col))
    }

    /// Rows as records keyed by column name.
    pub fn records(&self) -> Vec<NormalizedRecord> {
        self.rows
            .iter()
            .map(|row| NormalizedRecord {
                fields: self.columns.iter().cloned().zip(row.iter().cloned()).collect(),
            })
            .collect()
    }

    /// Drops rows where every cell is empty; returns how many were dropped.
    pub fn drop_blank_rows(&mut self) -> usize {
        let before = self.rows.len();
        self.rows.retain(|row| !row.iter().all(CellValue::is_empty));
        before - self.rows.len()
    }

    /// Drops columns that are empty in every row; returns their names.
    pub fn drop_blank_columns(&mut self) -> Vec<String> {
        let keep: Vec<bool> = (0..self.columns.len())
            .map(|col| self.rows.iter().any(|row| !row[col].is_empty()))
            .collect();
        if keep.iter().all(|keep| *keep) {
            return Vec::new();
        }

        let mut dropped = Vec::new();
        let columns = std::mem::take(&mut self.columns);
        for (name, keep) in columns.into_iter().zip(&keep) {
            if *keep {
                self.columns.push(name);
            } else {
                dropped.push(name);
            }
        }
        for row in self.rows.iter_mut() {
            let cells = std::mem::take(row);
            *row = cells
                .into_iter()
                .zip(&keep)
                .filter(|(_, keep)| **keep)
                .map(|(cell, _)| cell)
                .collect();
        }
        dropped
    }

    /// Applies [`coerce`] to every cell.
    pub fn coerce_cells(&mut self) {
        for cell in self.rows.iter_mut().flatten() {
            *cell = coerce(std::mem::take(cell));
        }
    }

    /// First `count` rows as a new table.
    pub fn head(&self, count: usize) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(count).cloned().collect(),
        }
    }

    /// Inferred type of every column, in column order.
    pub fn column_types(&self) -> Vec<ColumnType> {
        (0..self.columns.len())
            .map(|col| ColumnType::detect(self.rows.iter().map(|row| ColumnType::from(&row[col]))))
            .collect()
    }
}
