//! Turns located blocks into one normalized [`Table`].
//!
//! Merge policy:
//! - every block names its columns from its own header,
//! - the output columns are the union of all block columns in order of first
//!   appearance, and cells a block does not have are left empty,
//! - blocks whose headers share no column with the columns seen so far are
//!   rejected as ambiguous unless `allow_disjoint_blocks` is set,
//! - when any block has a marker, a marker column is appended holding the
//!   value of the nearest marker above each row.
use crate::config::ExtractorConfig;
use crate::error::ConsolidateError;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::grid::CellGrid;
use crate::table::column::normalize_header;
use crate::table::column::unique_names;
use crate::table::Table;
use crate::table::TableBlock;
use std::collections::HashMap;
use tracing::debug;

const GENERATED_PREFIX: &str = "column";

/// Extracts and merges the records of a grid's blocks.
#[derive(Clone, Debug, Default)]
pub struct TableExtractor {
    config: ExtractorConfig,
}

impl TableExtractor {
    pub fn new(config: &ExtractorConfig) -> Self {
        Self { config: config.clone() }
    }

    /// Builds one table from `blocks`, in block order.
    ///
    /// Blank rows are dropped per block; blank columns only once all blocks are
    /// merged, so a column filled in a single block survives.
    ///
    /// # Errors
    ///
    /// Returns [`ConsolidateError::StructureAmbiguous`] when a block's header
    /// has nothing in common with the headers before it.
    pub fn extract(&self, grid: &CellGrid, blocks: &[TableBlock]) -> Result<Table, ConsolidateError> {
        let with_markers = blocks.iter().any(|block| block.marker.is_some());
        let mut columns: Vec<String> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut rows: Vec<Vec<CellValue>> = Vec::new();
        let mut markers: Vec<CellValue> = Vec::new();
        let mut current_marker = CellValue::Empty;

        for block in blocks {
            if let Some(marker) = &block.marker {
                current_marker = marker.value.clone();
            }
            let Some((first, last)) = block.data_rows else {
                continue;
            };

            let names = header_names(grid, block);
            if !self.config.allow_disjoint_blocks && !shares_column(&columns, &names) {
                return Err(ConsolidateError::StructureAmbiguous(format!(
                    "Header at row {} [{}] shares no column with earlier blocks [{}]",
                    block.header_row + 1,
                    names.join(", "),
                    columns.join(", ")
                )));
            }
            let targets: Vec<usize> = names
                .into_iter()
                .map(|name| {
                    *positions.entry(name.clone()).or_insert_with(|| {
                        columns.push(name);
                        columns.len() - 1
                    })
                })
                .collect();

            let before = rows.len();
            for row in first..=last {
                if grid.is_blank_row(row) {
                    continue;
                }
                let mut record = vec![CellValue::Empty; columns.len()];
                let mut blank = true;
                for (offset, target) in targets.iter().enumerate() {
                    let cell = grid.get(row, block.columns.0 + offset);
                    if !cell.is_empty() {
                        blank = false;
                        record[*target] = cell.clone();
                    }
                }
                if !blank {
                    rows.push(record);
                    markers.push(current_marker.clone());
                }
            }
            debug!(header = block.header_row, rows = rows.len() - before, "Block extracted");
        }

        if with_markers {
            let mut names = columns.clone();
            names.push(self.config.marker_column.to_owned());
            let marker_column = unique_names(names).pop().unwrap_or_default();
            let width = columns.len();
            columns.push(marker_column);
            for (row, marker) in rows.iter_mut().zip(markers) {
                row.resize(width, CellValue::Empty);
                row.push(marker);
            }
        }

        let mut table = Table::new(columns, rows);
        let dropped = table.drop_blank_columns();
        if !dropped.is_empty() {
            debug!(columns = ?dropped, "Dropped blank columns");
        }
        Ok(table)
    }
}

/// Column names of a block header, unique within the block.
///
/// Empty header cells are named after their position (`column3`).
fn header_names(grid: &CellGrid, block: &TableBlock) -> Vec<String> {
    let names = (block.columns.0..=block.columns.1).map(|col| {
        let name = normalize_header(grid.get(block.header_row, col));
        if name.is_empty() {
            format!("{}{}", GENERATED_PREFIX, col + 1)
        } else {
            name
        }
    });
    unique_names(names)
}

fn is_generated(name: &str) -> bool {
    name.strip_prefix(GENERATED_PREFIX)
        .is_some_and(|number| !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()))
}

/// Returns true if the block header can be merged into the columns so far:
/// either side has no real names yet, or they have at least one in common.
fn shares_column(columns: &[String], names: &[String]) -> bool {
    let mut existing = columns.iter().filter(|name| !is_generated(name)).peekable();
    let mut incoming = names.iter().filter(|name| !is_generated(name)).peekable();
    if existing.peek().is_none() || incoming.peek().is_none() {
        return true;
    }
    let existing: Vec<&String> = existing.collect();
    incoming.any(|name| existing.contains(&name))
}
