use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::reference::index_to_reference;
use serde::Serialize;
use std::fmt::Display;

/// Structural shape of a sheet.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum StructureType {
    /// One header and one contiguous data region
    #[serde(rename = "SIMPLE")]
    Simple,
    /// Stacked blocks sharing a repeated header
    #[serde(rename = "COMPLEX")]
    Complex,
    /// Blocks each preceded by a date marker
    #[serde(rename = "COMPLEX_FECHA")]
    ComplexFecha,
}

impl StructureType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            StructureType::Simple => "SIMPLE",
            StructureType::Complex => "COMPLEX",
            StructureType::ComplexFecha => "COMPLEX_FECHA",
        }
    }
}

impl Display for StructureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A marker row scoping the block that follows it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Marker {
    /// Row holding the marker
    pub row: usize,
    /// Value attached to every record of the block, usually a date
    pub value: CellValue,
}

/// One header and data region located in a grid.
///
/// Row and column indexes are 0-based and inclusive. Blocks of one grid never
/// overlap and are ordered by [`start_row`](Self::start_row).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TableBlock {
    pub header_row: usize,
    /// First and last data row; `None` when the block has no data rows
    pub data_rows: Option<(usize, usize)>,
    /// First and last column
    pub columns: (usize, usize),
    pub marker: Option<Marker>,
}

impl TableBlock {
    /// First row owned by the block: its marker row, else its header.
    pub fn start_row(&self) -> usize {
        self.marker.as_ref().map(|marker| marker.row).unwrap_or(self.header_row)
    }

    /// Last row owned by the block.
    pub fn end_row(&self) -> usize {
        self.data_rows.map(|(_, last)| last).unwrap_or(self.header_row)
    }

    /// Number of rows in the data range, blank rows included.
    pub fn data_row_count(&self) -> usize {
        self.data_rows.map(|(first, last)| last - first + 1).unwrap_or(0)
    }

    /// Spreadsheet-style range from header to last data cell, e.g. `A1:C10`.
    pub fn range(&self) -> String {
        format!(
            "{}:{}",
            index_to_reference(self.header_row, self.columns.0),
            index_to_reference(self.end_row(), self.columns.1)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_bounds() {
        let block = TableBlock {
            header_row: 1,
            data_rows: Some((2, 5)),
            columns: (0, 2),
            marker: Some(Marker {
                row: 0,
                value: CellValue::from("2024-01-01"),
            }),
        };
        assert_eq!(block.start_row(), 0);
        assert_eq!(block.end_row(), 5);
        assert_eq!(block.data_row_count(), 4);
        assert_eq!(block.range(), "A2:C6");
    }

    #[test]
    fn degraded_block() {
        let block = TableBlock {
            header_row: 0,
            data_rows: None,
            columns: (0, 0),
            marker: None,
        };
        assert_eq!(block.start_row(), 0);
        assert_eq!(block.end_row(), 0);
        assert_eq!(block.data_row_count(), 0);
        assert_eq!(block.range(), "A1:A1");
    }

    #[test]
    fn structure_names() {
        assert_eq!(StructureType::ComplexFecha.to_string(), "COMPLEX_FECHA");
        assert_eq!(serde_json::to_string(&StructureType::Simple).unwrap(), r#""SIMPLE""#);
    }
}
