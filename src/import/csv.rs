// CSV Reader
//
// Header-keyed CSV parsing for export files. Quoted fields may contain
// commas, newlines and doubled quotes. Blank lines are skipped and every
// value is trimmed.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::import::error::{ImportError, ImportResult};

/// One data row keyed by header name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CsvRecord {
    values: HashMap<String, String>,
}

impl CsvRecord {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Value of a column, None when absent or empty
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values
            .get(column)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// First non-empty value among several column aliases
    pub fn first_of(&self, columns: &[&str]) -> Option<&str> {
        columns.iter().find_map(|column| self.get(column))
    }

    /// Like `first_of`, falling back to an empty string
    pub fn text(&self, columns: &[&str]) -> String {
        self.first_of(columns).unwrap_or_default().to_string()
    }

    /// Numeric value of the first matching column; unparseable or absent is zero
    pub fn decimal(&self, columns: &[&str]) -> Decimal {
        self.first_of(columns)
            .and_then(|v| Decimal::from_str(&v.replace(',', "")).ok())
            .unwrap_or(Decimal::ZERO)
    }
}

/// Parsed file: header names in file order plus the data rows
#[derive(Debug, Clone, PartialEq)]
pub struct CsvDocument {
    pub headers: Vec<String>,
    pub rows: Vec<CsvRecord>,
}

impl CsvDocument {
    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }

    pub fn require_column(&self, column: &str) -> ImportResult<()> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(ImportError::MissingColumn(column.to_string()))
        }
    }
}

/// Parse CSV text whose first non-blank record is the header row
pub fn parse_csv(input: &str) -> ImportResult<CsvDocument> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    let mut records = split_records(input)?.into_iter();

    let headers = records.next().ok_or(ImportError::EmptyInput)?;

    let rows = records
        .map(|values| {
            CsvRecord::from_pairs(headers.iter().enumerate().map(|(i, header)| {
                (
                    header.clone(),
                    values.get(i).cloned().unwrap_or_default(),
                )
            }))
        })
        .collect();

    tracing::debug!("Parsed CSV with {} columns", headers.len());

    Ok(CsvDocument { headers, rows })
}

fn split_records(input: &str) -> ImportResult<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut quote_line = 1;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.trim().is_empty() => {
                field.clear();
                in_quotes = true;
                quote_line = line;
            }
            ',' => {
                record.push(field.trim().to_string());
                field.clear();
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\r' | '\n' => {
                line += 1;
                finish_record(&mut records, &mut record, &mut field);
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(ImportError::UnterminatedQuote { line: quote_line });
    }
    if !field.is_empty() || !record.is_empty() {
        finish_record(&mut records, &mut record, &mut field);
    }

    Ok(records)
}

fn finish_record(records: &mut Vec<Vec<String>>, record: &mut Vec<String>, field: &mut String) {
    record.push(field.trim().to_string());
    field.clear();

    let values = std::mem::take(record);
    if values.iter().any(|v| !v.is_empty()) {
        records.push(values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_document() {
        let doc = parse_csv("Handle,Title,Price\ntea,Green Tea,320\ncake, Cheesecake ,450\n").unwrap();
        assert_eq!(doc.headers, vec!["Handle", "Title", "Price"]);
        assert_eq!(doc.rows.len(), 2);
        assert_eq!(doc.rows[1].get("Title"), Some("Cheesecake"));
        assert_eq!(doc.rows[0].get("Price"), Some("320"));
    }

    #[test]
    fn test_quoted_fields() {
        let csv = "Handle,Body (HTML)\n\"tea\",\"<p>Hello, \"\"world\"\"</p>\nsecond line\"\n";
        let doc = parse_csv(csv).unwrap();
        assert_eq!(doc.rows.len(), 1);
        assert_eq!(
            doc.rows[0].get("Body (HTML)"),
            Some("<p>Hello, \"world\"</p>\nsecond line")
        );
    }

    #[test]
    fn test_blank_lines_bom_and_crlf() {
        let csv = "\u{feff}Handle,Title\r\n\r\ntea,Green Tea\r\n   \r\ncake,Cake\r\n";
        let doc = parse_csv(csv).unwrap();
        assert_eq!(doc.headers[0], "Handle");
        assert_eq!(doc.rows.len(), 2);
        assert_eq!(doc.rows[1].get("Handle"), Some("cake"));
    }

    #[test]
    fn test_short_rows_pad_with_empty_values() {
        let doc = parse_csv("Handle,Title,Price\ntea\n").unwrap();
        assert_eq!(doc.rows[0].get("Handle"), Some("tea"));
        assert_eq!(doc.rows[0].get("Title"), None);
        assert_eq!(doc.rows[0].text(&["Price"]), "");
    }

    #[test]
    fn test_empty_and_unterminated_input() {
        assert!(matches!(parse_csv(""), Err(ImportError::EmptyInput)));
        assert!(matches!(parse_csv("\n\n"), Err(ImportError::EmptyInput)));

        let err = parse_csv("Handle,Title\ntea,\"Green\nTea\n").unwrap_err();
        assert!(matches!(err, ImportError::UnterminatedQuote { line: 2 }));
    }

    #[test]
    fn test_first_of_aliases() {
        let record = CsvRecord::from_pairs([("Order ID", ""), ("訂單編號", "A-100")]);
        assert_eq!(record.first_of(&["Order ID", "訂單編號", "id"]), Some("A-100"));
        assert_eq!(record.first_of(&["id"]), None);
    }

    #[test]
    fn test_decimal_values() {
        let record = CsvRecord::from_pairs([("Total", "1,250.50"), ("Tax", "n/a")]);
        assert_eq!(record.decimal(&["Total"]), Decimal::new(125050, 2));
        assert_eq!(record.decimal(&["Tax"]), Decimal::ZERO);
        assert_eq!(record.decimal(&["Missing"]), Decimal::ZERO);
    }

    #[test]
    fn test_require_column() {
        let doc = parse_csv("Title\nTea\n").unwrap();
        assert!(doc.require_column("Title").is_ok());
        assert!(matches!(
            doc.require_column("Handle"),
            Err(ImportError::MissingColumn(_))
        ));
    }
}
