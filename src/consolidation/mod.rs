//! # Consolidation
//!
//! Control flows leaves first:
//!
//! - [`StructureDetector`] classifies a grid and locates its blocks,
//! - [`TableExtractor`] merges the blocks into one table,
//! - [`Consolidator`] runs detection, extraction, cleaning and writing for a
//!   file,
//! - [`BatchConsolidator`] fans the consolidator out over many files.
//!
//! Detection and extraction are pure computations over an in-memory grid; the
//! only blocking calls are the grid source reads and the table sink writes
//! inside [`Consolidator`].
pub mod batch;
pub mod consolidator;
pub mod detector;
pub mod extractor;

#[cfg(test)]
pub(crate) mod memory;

pub use batch::BatchConsolidator;
pub use batch::BatchOptions;
pub use batch::BatchSummary;
pub use consolidator::Analysis;
pub use consolidator::ColumnSummary;
pub use consolidator::ConsolidationResult;
pub use consolidator::Consolidator;
pub use consolidator::Failure;
pub use consolidator::Progress;
pub use consolidator::SheetAnalysis;
pub use consolidator::WorkbookAnalysis;
pub use detector::Detection;
pub use detector::StructureDetector;
pub use extractor::TableExtractor;
