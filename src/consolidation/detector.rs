//! Classifies the shape of a grid and locates its table blocks.
//!
//! Detection is a pure function of the grid and the [`DetectorConfig`]: it
//! never fails, and the same grid always yields the same blocks.
use crate::config::DetectorConfig;
use crate::error::ConsolidateError;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::grid::CellGrid;
use crate::table::column::normalize_header;
use crate::table::Marker;
use crate::table::StructureType;
use crate::table::TableBlock;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::HashSet;
use tracing::debug;

/// Outcome of structure detection.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Detection {
    pub structure: StructureType,
    /// Ordered by starting row, never overlapping
    pub blocks: Vec<TableBlock>,
}

impl Detection {
    /// Returns true when no header was found and the single block is a
    /// placeholder without data rows.
    pub fn is_degraded(&self) -> bool {
        self.blocks.iter().all(|block| block.data_rows.is_none())
    }
}

/// Counts describing the populated cells of one row.
#[derive(Clone, Copy, Debug, Default)]
struct RowProfile {
    populated: usize,
    labels: usize,
    typed: usize,
    max_gap: usize,
}

impl RowProfile {
    fn of(grid: &CellGrid, row: usize) -> RowProfile {
        let mut profile = RowProfile::default();
        let mut previous: Option<usize> = None;
        for (col, cell) in grid.populated(row) {
            profile.populated += 1;
            if cell.is_label() {
                profile.labels += 1;
            }
            if cell.is_typed() {
                profile.typed += 1;
            }
            if let Some(previous) = previous {
                profile.max_gap = profile.max_gap.max(col - previous - 1);
            }
            previous = Some(col);
        }
        profile
    }

    fn typed_fraction(&self) -> f64 {
        if self.populated == 0 {
            0.0
        } else {
            self.typed as f64 / self.populated as f64
        }
    }
}

/// A row where a block begins, with the marker scoping it.
#[derive(Clone, Debug)]
struct BlockStart {
    header_row: usize,
    marker: Option<Marker>,
}

/// Finds headers, markers and data ranges in a [`CellGrid`].
#[derive(Clone, Debug)]
pub struct StructureDetector {
    config: DetectorConfig,
    label_pattern: Regex,
    date_pattern: Regex,
}

impl StructureDetector {
    /// Creates a detector, compiling the configured marker patterns.
    ///
    /// # Errors
    ///
    /// Returns [`ConsolidateError::Config`] if a marker pattern is not a valid
    /// regular expression.
    pub fn new(config: &DetectorConfig) -> Result<Self, ConsolidateError> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|error| ConsolidateError::Config(format!("Invalid marker pattern '{}': {}", pattern, error)))
        };
        Ok(Self {
            config: config.clone(),
            label_pattern: compile(&config.marker_label_pattern)?,
            date_pattern: compile(&config.marker_date_pattern)?,
        })
    }

    /// Classifies a grid and computes its blocks.
    ///
    /// Blocks start at:
    /// - the header following each marker row,
    /// - any row repeating the header of an earlier block,
    /// - any other header candidate that is the first block of the grid or
    ///   follows a blank row.
    ///
    /// Without any of these, the first header-shaped row followed by data is
    /// used together with the later rows repeating it, and failing that a
    /// degraded block at row 0 is returned.
    pub fn detect(&self, grid: &CellGrid) -> Detection {
        let mut starts = self.find_block_starts(grid);
        if starts.is_empty() {
            if let Some(header_row) = self.fallback_header(grid) {
                starts = self.fallback_starts(grid, header_row);
            }
        }
        if starts.is_empty() {
            debug!(rows = grid.row_count(), "No header found");
            return Detection {
                structure: StructureType::Simple,
                blocks: vec![TableBlock {
                    header_row: 0,
                    data_rows: None,
                    columns: (0, grid.column_count().saturating_sub(1)),
                    marker: None,
                }],
            };
        }

        let has_markers = starts.iter().any(|start| start.marker.is_some());
        let single = starts.len() == 1 && !has_markers;
        let mut blocks = Vec::with_capacity(starts.len());
        for (index, start) in starts.iter().enumerate() {
            let limit = starts
                .get(index + 1)
                .map(|next| next.marker.as_ref().map(|marker| marker.row).unwrap_or(next.header_row))
                .unwrap_or(grid.row_count());
            let data_rows = self.data_range(grid, start.header_row, limit, single);
            blocks.push(TableBlock {
                header_row: start.header_row,
                data_rows,
                columns: column_range(grid, start.header_row, data_rows),
                marker: start.marker.clone(),
            });
        }

        let structure = if has_markers {
            StructureType::ComplexFecha
        } else if blocks.len() > 1 {
            StructureType::Complex
        } else {
            StructureType::Simple
        };
        for block in &blocks {
            debug!(
                header = block.header_row,
                range = %block.range(),
                rows = block.data_row_count(),
                marker = block.marker.as_ref().map(|marker| marker.value.to_string()),
                "Block found"
            );
        }
        Detection { structure, blocks }
    }

    /// A row is header-shaped when it has enough populated cells, enough of
    /// them are labels, and no gap between them is too wide.
    fn is_header_shaped(&self, profile: &RowProfile) -> bool {
        profile.populated >= self.config.min_header_cells
            && profile.labels as f64 / profile.populated as f64 >= self.config.min_header_text_ratio
            && profile.max_gap <= self.config.max_header_gap
    }

    /// A header candidate is header-shaped and followed by a row holding a
    /// higher share of typed values.
    fn is_header_candidate(&self, grid: &CellGrid, row: usize) -> bool {
        let profile = RowProfile::of(grid, row);
        if !self.is_header_shaped(&profile) || grid.is_blank_row(row + 1) {
            return false;
        }
        RowProfile::of(grid, row + 1).typed_fraction() > profile.typed_fraction()
    }

    fn find_block_starts(&self, grid: &CellGrid) -> Vec<BlockStart> {
        let mut anchored = self.find_markers(grid);
        let marker_rows: HashSet<usize> = anchored.values().map(|marker| marker.row).collect();
        let mut signatures: HashSet<Vec<String>> = HashSet::new();
        let mut starts: Vec<BlockStart> = Vec::new();
        let mut after_blank = true;

        for row in 0..grid.row_count() {
            if marker_rows.contains(&row) {
                continue;
            }
            if let Some(marker) = anchored.remove(&row) {
                signatures.insert(signature(grid, row));
                starts.push(BlockStart {
                    header_row: row,
                    marker: Some(marker),
                });
                after_blank = false;
                continue;
            }
            if grid.is_blank_row(row) {
                after_blank = true;
                continue;
            }

            let profile = RowProfile::of(grid, row);
            if self.is_header_shaped(&profile) {
                let signature = signature(grid, row);
                let repeated = signatures.contains(&signature);
                if repeated || ((starts.is_empty() || after_blank) && self.is_header_candidate(grid, row)) {
                    debug!(row, repeated, "Header found");
                    signatures.insert(signature);
                    starts.push(BlockStart {
                        header_row: row,
                        marker: None,
                    });
                }
            }
            after_blank = false;
        }
        starts
    }

    /// First header-shaped row with a non-blank row below it.
    fn fallback_header(&self, grid: &CellGrid) -> Option<usize> {
        (0..grid.row_count()).find(|row| self.is_header_shaped(&RowProfile::of(grid, *row)) && !grid.is_blank_row(row + 1))
    }

    /// The fallback header plus every later row repeating its signature.
    ///
    /// Text-only tables never yield header candidates, so their repeated
    /// headers are only found here.
    fn fallback_starts(&self, grid: &CellGrid, header_row: usize) -> Vec<BlockStart> {
        let header = signature(grid, header_row);
        (header_row..grid.row_count())
            .filter(|row| {
                *row == header_row
                    || (self.is_header_shaped(&RowProfile::of(grid, *row)) && signature(grid, *row) == header)
            })
            .map(|header_row| {
                debug!(row = header_row, "Header found");
                BlockStart {
                    header_row,
                    marker: None,
                }
            })
            .collect()
    }

    /// Maps the header row following each marker to that marker.
    ///
    /// A marker only counts when the next non-blank row is header-shaped and
    /// is not itself a marker.
    fn find_markers(&self, grid: &CellGrid) -> BTreeMap<usize, Marker> {
        let candidates: Vec<(usize, CellValue)> = (0..grid.row_count())
            .filter_map(|row| self.marker_value(grid, row).map(|value| (row, value)))
            .collect();
        let rows: HashSet<usize> = candidates.iter().map(|(row, _)| *row).collect();

        let mut markers = BTreeMap::new();
        for (row, value) in candidates {
            let header = (row + 1..grid.row_count()).find(|next| !grid.is_blank_row(*next));
            match header {
                Some(header)
                    if !rows.contains(&header) && self.is_header_shaped(&RowProfile::of(grid, header)) =>
                {
                    debug!(row, header, %value, "Marker found");
                    markers.insert(header, Marker { row, value });
                }
                _ => debug!(row, "Marker without a table below"),
            }
        }
        markers
    }

    /// Reads the value of a marker row, or `None` if the row is no marker.
    ///
    /// Two forms are recognised on the first populated cell of the row:
    /// - a prefix such as `FECHA:`, whose value is the rest of the cell or the
    ///   next populated cell,
    /// - a label such as `DIA / FECHA` followed, within the lookahead, by a
    ///   cell matching the date pattern.
    fn marker_value(&self, grid: &CellGrid, row: usize) -> Option<CellValue> {
        let (col, cell) = grid.populated(row).next()?;
        let text = cell.as_text()?;

        for prefix in &self.config.marker_prefixes {
            let matched = text
                .get(..prefix.len())
                .is_some_and(|head| head.to_lowercase() == prefix.to_lowercase());
            if matched {
                let rest = text[prefix.len()..].trim();
                if !rest.is_empty() {
                    return Some(CellValue::from(rest));
                }
                return Some(
                    grid.populated(row)
                        .nth(1)
                        .map(|(_, value)| value.clone())
                        .unwrap_or_default(),
                );
            }
        }

        if self.label_pattern.is_match(text) {
            return (col + 1..=col + self.config.marker_lookahead)
                .map(|next| grid.get(row, next))
                .find(|value| match value {
                    CellValue::Date(_) => true,
                    CellValue::Text(text) => self.date_pattern.is_match(text),
                    _ => false,
                })
                .cloned();
        }
        None
    }

    /// Data rows of a block: from below the header to the row before `limit`,
    /// without trailing blank rows. A lone table also ends at the first run of
    /// `blank_run_length` blank rows.
    fn data_range(&self, grid: &CellGrid, header_row: usize, limit: usize, single: bool) -> Option<(usize, usize)> {
        let first = header_row + 1;
        let mut end = limit;
        if single {
            let mut blanks = 0;
            for row in first..limit {
                if grid.is_blank_row(row) {
                    blanks += 1;
                    if blanks >= self.config.blank_run_length.max(1) {
                        end = row + 1 - blanks;
                        break;
                    }
                } else {
                    blanks = 0;
                }
            }
        }
        let last = (first..end).rev().find(|row| !grid.is_blank_row(*row))?;
        Some((first, last))
    }
}

/// Normalized texts of a row's populated cells.
fn signature(grid: &CellGrid, row: usize) -> Vec<String> {
    grid.populated(row).map(|(_, cell)| normalize_header(cell)).collect()
}

/// Leftmost and rightmost populated column over header and data rows.
fn column_range(grid: &CellGrid, header_row: usize, data_rows: Option<(usize, usize)>) -> (usize, usize) {
    let last = data_rows.map(|(_, last)| last).unwrap_or(header_row);
    (header_row..=last)
        .filter_map(|row| grid.column_span(row))
        .fold(None, |range: Option<(usize, usize)>, (first, last)| match range {
            Some((min, max)) => Some((min.min(first), max.max(last))),
            None => Some((first, last)),
        })
        .unwrap_or((0, 0))
}
