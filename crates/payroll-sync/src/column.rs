//! Spreadsheet-style column addressing (`A`, `B`, ..., `Z`, `AA`, ...).

use std::fmt;
use std::str::FromStr;

/// Convert a 1-based column number to its letter label. Column `0` has no label and yields
/// an empty string.
pub fn column_number_to_letter(mut column: usize) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        let rem = (column - 1) % 26;
        letters.push(b'A' + rem as u8);
        column = (column - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Inverse of [`column_number_to_letter`], case-insensitive. Returns `None` for anything
/// that isn't a non-empty run of ASCII letters.
pub fn column_letter_to_number(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    letters.chars().try_fold(0usize, |acc, c| {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        acc.checked_mul(26)?.checked_add(digit)
    })
}

/// `Germany!F12`
pub fn a1_address(tab: &str, row: usize, column: usize) -> String {
    format!("{tab}!{}{row}", column_number_to_letter(column))
}

/// A 1-based column position, written either as letters (`F`) or as a number (`6`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Column(pub usize);

impl Column {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&column_number_to_letter(self.0))
    }
}

impl FromStr for Column {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let index = match s.parse::<usize>() {
            Ok(number) => number,
            Err(_) => column_letter_to_number(s)
                .ok_or_else(|| format!("'{s}' is not a column letter or number"))?,
        };
        if index == 0 {
            return Err("columns are 1-based".to_string());
        }
        Ok(Column(index))
    }
}
