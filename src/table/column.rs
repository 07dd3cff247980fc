use crate::spreadsheet::cell::format_date;
use crate::spreadsheet::cell::format_number;
use crate::spreadsheet::cell::parse_iso_datetime;
use crate::spreadsheet::cell::CellValue;
use chrono::NaiveTime;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::LazyLock;

static DECIMAL_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+(\.\d+)?$").expect("Hardcode regex pattern"));

static ISO_DATE_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}( \d{2}:\d{2}:\d{2})?$").expect("Hardcode regex pattern"));

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("Hardcode regex pattern"));

/// Inferred type of a consolidated column.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Whole numbers
    Integer,
    /// Any numbers
    Number,
    /// Dates without time of day
    Date,
    /// Dates with time of day
    Timestamp,
    /// Text or mixed values
    Text,
    /// No value in any row
    Empty,
}

impl ColumnType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Number => "number",
            ColumnType::Date => "date",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Text => "text",
            ColumnType::Empty => "empty",
        }
    }

    /// Type of a single cell; `None` for empty cells.
    pub fn from(cell: &CellValue) -> Option<Self> {
        match cell {
            CellValue::Empty => None,
            CellValue::Number(value) if value.fract() == 0.0 => Some(ColumnType::Integer),
            CellValue::Number(_) => Some(ColumnType::Number),
            CellValue::Date(value) if value.time() == NaiveTime::MIN => Some(ColumnType::Date),
            CellValue::Date(_) => Some(ColumnType::Timestamp),
            CellValue::Text(_) => Some(ColumnType::Text),
        }
    }

    /// Detects the most specific type shared by all cell types.
    /// Empty input yields [`ColumnType::Empty`]; disagreeing types yield text.
    pub fn detect<I>(types: I) -> ColumnType
    where
        I: IntoIterator<Item = Option<ColumnType>>,
    {
        let types: Vec<ColumnType> = types.into_iter().flatten().collect();
        if types.is_empty() {
            ColumnType::Empty
        } else if types.iter().all(|kind| kind.is_int()) {
            ColumnType::Integer
        } else if types.iter().all(|kind| kind.is_float()) {
            ColumnType::Number
        } else if types.iter().all(|kind| kind.is_date()) {
            ColumnType::Date
        } else if types.iter().all(|kind| kind.is_datetime()) {
            ColumnType::Timestamp
        } else {
            ColumnType::Text
        }
    }

    #[inline]
    pub fn is_int(&self) -> bool {
        matches!(self, ColumnType::Integer)
    }

    #[inline]
    pub fn is_float(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Number)
    }

    #[inline]
    pub fn is_date(&self) -> bool {
        matches!(self, ColumnType::Date)
    }

    #[inline]
    pub fn is_datetime(&self) -> bool {
        matches!(self, ColumnType::Date | ColumnType::Timestamp)
    }
}

/// Normalizes a header cell: trimmed, whitespace runs collapsed to one space.
/// Non-text headers use their display form.
pub fn normalize_header(cell: &CellValue) -> String {
    WHITESPACE.replace_all(cell.to_string().trim(), " ").into_owned()
}

/// Makes names unique by suffixing repeats with a counter: `Total`, `Total_2`, …
///
/// A suffixed name that is itself taken keeps counting, so the result never
/// holds duplicates.
pub fn unique_names<I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut used = HashSet::new();
    let mut unique = Vec::new();
    for name in names {
        let mut candidate = name.clone();
        let mut counter = 2;
        while used.contains(&candidate) {
            candidate = format!("{}_{}", name, counter);
            counter += 1;
        }
        used.insert(candidate.clone());
        unique.push(candidate);
    }
    unique
}

/// Turns text that unambiguously spells a number or ISO date into that value.
///
/// Coercion only happens when it is lossless: the value must display exactly
/// as the trimmed text did. `"30"` and `"2.5"` become numbers, `"2024-01-01"`
/// becomes a date, while `"007"`, `"1.50"`, `"1,5"`, `"+5"` and `"01/02/2024"`
/// stay text because converting them would drop or guess information.
pub fn coerce(cell: CellValue) -> CellValue {
    let CellValue::Text(text) = &cell else {
        return cell;
    };
    let trimmed = text.trim();
    if DECIMAL_TEXT.is_match(trimmed) {
        if let Ok(value) = trimmed.parse::<f64>() {
            if value.is_finite() && format_number(value) == trimmed {
                return CellValue::Number(value);
            }
        }
    } else if ISO_DATE_TEXT.is_match(trimmed) {
        if let Some(value) = parse_iso_datetime(trimmed) {
            if format_date(&value) == trimmed {
                return CellValue::Date(value);
            }
        }
    }
    cell
}
