//! The shapes consolidation works with: located blocks, column naming and
//! typing rules, and the normalized [`Table`] produced from a grid.
pub mod block;
pub mod column;
#[allow(clippy::module_inception)]
pub mod table;

pub use block::Marker;
pub use block::StructureType;
pub use block::TableBlock;
pub use column::ColumnType;
pub use table::NormalizedRecord;
pub use table::Table;
