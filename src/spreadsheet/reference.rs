//! A1-style cell references.

/// Converts a 0-based column index to its letters (`0` → `A`, `26` → `AA`).
pub fn column_letters(col: usize) -> String {
    let mut column = col as u64 + 1;
    let mut letters = String::new();
    while column > 0 {
        column -= 1;
        letters.insert(0, char::from(b'A' + (column % 26) as u8));
        column /= 26;
    }
    letters
}

/// Converts 0-based row & column indexes to an A1-style reference.
pub fn index_to_reference(row: usize, col: usize) -> String {
    format!("{}{}", column_letters(col), row + 1)
}
