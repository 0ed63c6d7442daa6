//! Column selection for the input table.
//!
//! A selection is a list of 1-based column numbers and increasing ranges,
//! separated by commas or whitespace: `"1 3:14"`, `"2,4,7:11,15"`.

use std::str::FromStr;

use crate::error::CalibError;

/// Columns per band: instrumental, its error, standard, its error.
pub const COLUMNS_PER_BAND: usize = 4;

/// Parsed `--columns` argument, stored as 0-based indexes in the given order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    indexes: Vec<usize>,
}

impl ColumnSpec {
    pub fn parse(s: &str) -> Result<Self, CalibError> {
        let mut indexes = Vec::new();
        for token in s.split(|c: char| c == ',' || c.is_whitespace()).filter(|t| !t.is_empty()) {
            match token.split_once(':') {
                None => indexes.push(parse_column_number(token)?),
                Some((start, end)) => {
                    let (n, m) = (parse_column_number(start)?, parse_column_number(end)?);
                    if n >= m {
                        return Err(invalid(token));
                    }
                    indexes.extend(n..=m);
                }
            }
        }
        if indexes.is_empty() {
            return Err(CalibError::InputShape("empty column selection".to_string()));
        }
        Ok(Self { indexes })
    }

    /// Every column of a table `width` columns wide.
    pub fn all(width: usize) -> Self {
        Self {
            indexes: (0..width).collect(),
        }
    }

    pub fn indexes(&self) -> &[usize] {
        &self.indexes
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Number of bands, if the selection has the `4n + 1` shape.
    pub fn band_count(&self) -> Result<usize, CalibError> {
        let (bands, rest) = (self.len() / COLUMNS_PER_BAND, self.len() % COLUMNS_PER_BAND);
        if rest != 1 || bands == 0 {
            return Err(CalibError::InputShape(format!(
                "number of columns must be {COLUMNS_PER_BAND}n + 1, got {}",
                self.len()
            )));
        }
        Ok(bands)
    }
}

impl FromStr for ColumnSpec {
    type Err = CalibError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// 1-based column number to 0-based index. Column 0 does not exist.
fn parse_column_number(token: &str) -> Result<usize, CalibError> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(token));
    }
    match token.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(invalid(token)),
    }
}

fn invalid(token: &str) -> CalibError {
    CalibError::InputShape(format!("invalid column argument '{token}'"))
}
