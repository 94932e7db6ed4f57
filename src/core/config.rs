//! Board configuration parsing.
//!
//! The format is a plain text stream: the first non-blank line is `RxC`
//! (positive integers), followed by exactly `R*C` non-blank lines, each the
//! initial value of one card in row-major order. Blank lines are skipped
//! everywhere and values are trimmed.

use std::fs;
use std::path::Path;

use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum BoardFileError {
    #[error("failed to read board file: {0}")]
    Io(#[from] std::io::Error),
    #[error("board file is empty")]
    Empty,
    #[error("invalid board size, expected 'RxC' with positive integers, found: {0}")]
    InvalidSize(String),
    #[error("wrong number of cards: expected {expected}, found {found}")]
    CardCount { expected: usize, found: usize },
}

/// Parsed board configuration: dimensions plus one value per card,
/// row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardFile {
    pub rows: usize,
    pub columns: usize,
    pub values: Vec<String>,
}

impl BoardFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BoardFileError> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(input: &str) -> Result<Self, BoardFileError> {
        let mut lines = input.lines().map(str::trim).filter(|line| !line.is_empty());

        let size_line = lines.next().ok_or(BoardFileError::Empty)?;
        let (rows, columns) = parse_size(size_line)?;

        let values: Vec<String> = lines.map(str::to_string).collect();
        let expected = rows * columns;
        if values.len() != expected {
            return Err(BoardFileError::CardCount {
                expected,
                found: values.len(),
            });
        }

        Ok(Self {
            rows,
            columns,
            values,
        })
    }
}

fn parse_size(line: &str) -> Result<(usize, usize), BoardFileError> {
    let invalid = || BoardFileError::InvalidSize(line.to_string());

    let (rows, columns) = line.split_once('x').ok_or_else(invalid)?;
    let rows = rows.trim().parse::<usize>().map_err(|_| invalid())?;
    let columns = columns.trim().parse::<usize>().map_err(|_| invalid())?;
    if rows == 0 || columns == 0 {
        return Err(invalid());
    }
    Ok((rows, columns))
}
