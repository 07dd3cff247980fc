use calamine::Data;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use iso8601_duration::Duration as IsoDuration;
use serde::Serialize;
use serde::Serializer;
use std::fmt::Display;

/// A single spreadsheet value, converted once at the grid boundary.
///
/// Downstream code never sees the reader's raw cell types: booleans arrive as
/// text, error cells as [`CellValue::Empty`], and ISO durations as `HH:MM:SS`
/// text.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CellValue {
    #[default]
    Empty,
    /// Numeric values (integers are stored as whole floats)
    Number(f64),
    /// Non-blank text, stored untrimmed
    Text(String),
    /// Date or date/time values
    Date(NaiveDateTime),
}

impl CellValue {
    /// Returns true for empty cells.
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Returns true for native numbers or text that reads as a plain number.
    pub fn is_numeric(&self) -> bool {
        match self {
            CellValue::Number(_) => true,
            CellValue::Text(text) => is_numeric_text(text),
            _ => false,
        }
    }

    /// Returns true for cells that carry a typed (non-label) value.
    pub fn is_typed(&self) -> bool {
        matches!(self, CellValue::Date(_)) || self.is_numeric()
    }

    /// Returns true for text cells that do not read as numbers.
    pub fn is_label(&self) -> bool {
        matches!(self, CellValue::Text(text) if !is_numeric_text(text))
    }

    /// Returns the trimmed text of a text cell.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(text) => Some(text.trim()),
            _ => None,
        }
    }
}

/// Checks whether text is a number once thousands/decimal separators are ignored.
///
/// `"1.234,5"` and `"-42"` are numeric; `"N° 5"` and `"."` are not.
pub fn is_numeric_text(text: &str) -> bool {
    let text = text.trim();
    let digits = text.strip_prefix('-').unwrap_or(text);
    let mut has_digit = false;
    for character in digits.chars() {
        match character {
            '0'..='9' => has_digit = true,
            '.' | ',' => (),
            _ => return false,
        }
    }
    has_digit
}

/// Formats a number without a trailing `.0` when it is whole.
pub(crate) fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Formats a date, dropping the time part at midnight.
pub(crate) fn format_date(value: &NaiveDateTime) -> String {
    if value.time() == NaiveTime::MIN {
        value.format("%Y-%m-%d").to_string()
    } else {
        value.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Parses `YYYY-MM-DD` or `YYYY-MM-DD[T ]HH:MM:SS[.f]`.
pub(crate) fn parse_iso_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

/// Converts an ISO 8601 duration (`PT1H30M`) to `HH:MM:SS`.
fn iso_duration_to_time(value: &str) -> Option<String> {
    let duration = value.parse::<IsoDuration>().ok()?;
    let hours = (duration.day * 24.0 + duration.hour) as i64;
    let minutes = duration.minute as i64;
    let seconds = duration.second.round() as i64;
    Some(format!("{hours:02}:{minutes:02}:{seconds:02}"))
}

impl From<&Data> for CellValue {
    fn from(data: &Data) -> Self {
        match data {
            Data::Int(value) => CellValue::Number(*value as f64),
            Data::Float(value) => CellValue::Number(*value),
            Data::String(value) if value.trim().is_empty() => CellValue::Empty,
            Data::String(value) => CellValue::Text(value.to_owned()),
            Data::Bool(value) => CellValue::Text(if *value { "TRUE" } else { "FALSE" }.to_owned()),
            Data::DateTime(value) => value
                .as_datetime()
                .map(CellValue::Date)
                .unwrap_or(CellValue::Number(value.as_f64())),
            Data::DateTimeIso(value) => parse_iso_datetime(value)
                .map(CellValue::Date)
                .unwrap_or_else(|| CellValue::Text(value.to_owned())),
            Data::DurationIso(value) => {
                CellValue::Text(iso_duration_to_time(value).unwrap_or_else(|| value.to_owned()))
            }
            Data::Error(_) | Data::Empty => CellValue::Empty,
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        if value.trim().is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(value.to_owned())
        }
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::from(value.as_str())
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(value: NaiveDate) -> Self {
        CellValue::Date(value.and_time(NaiveTime::MIN))
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(value: NaiveDateTime) -> Self {
        CellValue::Date(value)
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(value) => write!(f, "{}", format_number(*value)),
            CellValue::Text(value) => write!(f, "{}", value),
            CellValue::Date(value) => write!(f, "{}", format_date(value)),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Empty => serializer.serialize_none(),
            CellValue::Number(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
                serializer.serialize_i64(*value as i64)
            }
            CellValue::Number(value) => serializer.serialize_f64(*value),
            CellValue::Text(value) => serializer.serialize_str(value),
            CellValue::Date(value) => serializer.serialize_str(&format_date(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::ExcelDateTime;
    use calamine::ExcelDateTimeType;

    #[test]
    fn numeric_text_detection() {
        assert!(is_numeric_text("42"));
        assert!(is_numeric_text(" -3,5 "));
        assert!(is_numeric_text("1.234.567"));
        assert!(!is_numeric_text("."));
        assert!(!is_numeric_text("N° 5"));
        assert!(!is_numeric_text("Nombre"));
        assert!(!is_numeric_text(""));
    }

    #[test]
    fn classify_cells() {
        assert!(CellValue::from("Nombre").is_label());
        assert!(!CellValue::from("2024").is_label());
        assert!(CellValue::from("2024").is_typed());
        assert!(CellValue::from(30).is_typed());
        assert!(CellValue::from(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()).is_typed());
        assert!(CellValue::from("   ").is_empty());
    }

    #[test]
    fn display_values() {
        assert_eq!(CellValue::from(30).to_string(), "30");
        assert_eq!(CellValue::from(2.5).to_string(), "2.5");
        assert_eq!(CellValue::Empty.to_string(), "");
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(CellValue::from(date).to_string(), "2024-01-02");
        let datetime = date.and_hms_opt(8, 30, 0).unwrap();
        assert_eq!(CellValue::from(datetime).to_string(), "2024-01-02 08:30:00");
    }

    #[test]
    fn convert_reader_data() {
        assert_eq!(CellValue::from(&Data::Int(7)), CellValue::Number(7.0));
        assert_eq!(CellValue::from(&Data::String("  ".to_owned())), CellValue::Empty);
        assert_eq!(CellValue::from(&Data::Bool(true)), CellValue::Text("TRUE".to_owned()));
        assert_eq!(CellValue::from(&Data::Empty), CellValue::Empty);
        assert_eq!(
            CellValue::from(&Data::DateTimeIso("2024-03-05".to_owned())),
            CellValue::from(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap())
        );
        assert_eq!(
            CellValue::from(&Data::DurationIso("PT1H2M3S".to_owned())),
            CellValue::Text("01:02:03".to_owned())
        );
        let serial = ExcelDateTime::new(45292.0, ExcelDateTimeType::DateTime, false);
        assert_eq!(
            CellValue::from(&Data::DateTime(serial)),
            CellValue::from(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        );
    }

    #[test]
    fn serialize_values() {
        let values = vec![
            CellValue::Empty,
            CellValue::from(30),
            CellValue::from(1.5),
            CellValue::from("Ana"),
            CellValue::from(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[null,30,1.5,"Ana","2024-01-01"]"#);
    }
}
