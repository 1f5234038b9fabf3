//! Chat command parsing for the workbook assistant.
//!
//! Commands are accepted in Spanish and English, case-insensitively:
//!
//! ```text
//! pon 100 en Sheet1 B2                     put 100 in Sheet1 B2
//! pon la fórmula =SUM(A1:A3) en Sheet1 C1   put formula =SUM(A1:A3) in Sheet1 C1
//! calcula A1*2 en Sheet1 D1                 calculate A1*2 in Sheet1 D1
//! elimina la fila 3 en Sheet1               delete row 3 in Sheet1
//! combina columna A con columna B en Sheet1 y ponlo en C
//!                                           combine column A with column B in Sheet1 into C
//! lista hojas | hojas                       list sheets | sheets
//! ```

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::{CellRef, column_index};

const CELL: &str = r"([A-Za-z]{1,3}\d{1,7})";
const COLUMN: &str = r"([A-Za-z]{1,3})";

static FORMULA: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r"^(?:pon\s+la\s+f[oó]rmula|put\s+(?:the\s+)?formula)\s+(.+?)\s+(?:en|in)\s+(\S+)\s+{CELL}$"
    ))
});

static CALCULATE: Lazy<Regex> =
    Lazy::new(|| compile(&format!(r"^(?:calcula|calculate)\s+(.+?)\s+(?:en|in)\s+(\S+)\s+{CELL}$")));

static SET_VALUE: Lazy<Regex> =
    Lazy::new(|| compile(&format!(r"^(?:pon|put|set)\s+(.+?)\s+(?:en|in)\s+(\S+)\s+{CELL}$")));

static DELETE_ROW: Lazy<Regex> =
    Lazy::new(|| compile(r"^(?:elimina\s+la\s+fila|delete\s+row)\s+(\d+)\s+(?:en|in)\s+(\S+)$"));

static COMBINE_ES: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r"^combina\s+columna\s+{COLUMN}\s+con\s+columna\s+{COLUMN}\s+en\s+(\S+)\s+y\s+ponlo\s+en\s+{COLUMN}$"
    ))
});

static COMBINE_EN: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r"^combine\s+column\s+{COLUMN}\s+with\s+column\s+{COLUMN}\s+in\s+(\S+)\s+into\s+{COLUMN}$"
    ))
});

static LIST_SHEETS: Lazy<Regex> = Lazy::new(|| compile(r"^(?:lista\s+hojas|hojas|list\s+sheets|sheets)$"));

fn compile(pattern: &str) -> Regex {
    Regex::new(&format!("(?i){pattern}")).expect("Invalid command pattern regex")
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetValue { sheet: String, cell: CellRef, value: String },
    SetFormula { sheet: String, cell: CellRef, formula: String },
    DeleteRow { sheet: String, row: u32 },
    CombineColumns { sheet: String, first: u16, second: u16, destination: u16 },
    ListSheets,
    /// Input did not match any command
    Unknown,
}

/// Parse one chat message. Formula patterns are tried before the generic value pattern so
/// `pon la fórmula ...` is not taken for a value.
pub fn parse_command(text: &str) -> Command {
    let text = text.trim();

    if let Some(caps) = FORMULA.captures(text).or_else(|| CALCULATE.captures(text)) {
        return cell_command(&caps, |sheet, cell, formula| Command::SetFormula { sheet, cell, formula });
    }
    if let Some(caps) = SET_VALUE.captures(text) {
        return cell_command(&caps, |sheet, cell, value| Command::SetValue {
            sheet,
            cell,
            value: strip_quotes(&value).to_string(),
        });
    }
    if let Some(caps) = DELETE_ROW.captures(text) {
        return match caps[1].parse::<u32>() {
            Ok(row) => Command::DeleteRow {
                sheet: caps[2].to_string(),
                row,
            },
            Err(_) => Command::Unknown,
        };
    }
    if let Some(caps) = COMBINE_ES.captures(text).or_else(|| COMBINE_EN.captures(text)) {
        return match (column_index(&caps[1]), column_index(&caps[2]), column_index(&caps[4])) {
            (Some(first), Some(second), Some(destination)) => Command::CombineColumns {
                sheet: caps[3].to_string(),
                first,
                second,
                destination,
            },
            _ => Command::Unknown,
        };
    }
    if LIST_SHEETS.is_match(text) {
        return Command::ListSheets;
    }
    Command::Unknown
}

fn cell_command(caps: &Captures<'_>, build: impl FnOnce(String, CellRef, String) -> Command) -> Command {
    match caps[3].parse::<CellRef>() {
        Ok(cell) => build(caps[2].to_string(), cell, caps[1].trim().to_string()),
        Err(_) => Command::Unknown,
    }
}

/// Drop one pair of surrounding double quotes, if present.
fn strip_quotes(value: &str) -> &str {
    let value = value.strip_prefix('"').unwrap_or(value);
    value.strip_suffix('"').unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> CellRef {
        s.parse().unwrap()
    }

    #[test]
    fn test_set_value() {
        assert_eq!(
            parse_command("pon 100 en Hoja1 B2"),
            Command::SetValue {
                sheet: "Hoja1".into(),
                cell: at("B2"),
                value: "100".into()
            }
        );
        assert_eq!(
            parse_command("PUT \"hello world\" in Sheet1 a1"),
            Command::SetValue {
                sheet: "Sheet1".into(),
                cell: at("A1"),
                value: "hello world".into()
            }
        );
    }

    #[test]
    fn test_formula_wins_over_value() {
        assert_eq!(
            parse_command("pon la fórmula =SUM(A1:A10) en Hoja1 C2"),
            Command::SetFormula {
                sheet: "Hoja1".into(),
                cell: at("C2"),
                formula: "=SUM(A1:A10)".into()
            }
        );
        assert_eq!(
            parse_command("Pon la formula AVERAGE(B1:B4) en Hoja1 B5"),
            Command::SetFormula {
                sheet: "Hoja1".into(),
                cell: at("B5"),
                formula: "AVERAGE(B1:B4)".into()
            }
        );
        assert_eq!(
            parse_command("put formula =A1+A2 in Sheet1 A3"),
            Command::SetFormula {
                sheet: "Sheet1".into(),
                cell: at("A3"),
                formula: "=A1+A2".into()
            }
        );
    }

    #[test]
    fn test_calculate() {
        assert_eq!(
            parse_command("calcula A1*2 en Hoja1 D1"),
            Command::SetFormula {
                sheet: "Hoja1".into(),
                cell: at("D1"),
                formula: "A1*2".into()
            }
        );
    }

    #[test]
    fn test_delete_row() {
        assert_eq!(
            parse_command("elimina la fila 3 en Hoja1"),
            Command::DeleteRow {
                sheet: "Hoja1".into(),
                row: 3
            }
        );
        assert_eq!(
            parse_command("Delete Row 10 in Data"),
            Command::DeleteRow {
                sheet: "Data".into(),
                row: 10
            }
        );
    }

    #[test]
    fn test_combine_columns() {
        let expected = Command::CombineColumns {
            sheet: "Hoja1".into(),
            first: 0,
            second: 1,
            destination: 2,
        };
        assert_eq!(
            parse_command("combina columna A con columna B en Hoja1 y ponlo en C"),
            expected
        );
        assert_eq!(parse_command("combine column a with column b in Hoja1 into c"), expected);
    }

    #[test]
    fn test_list_sheets() {
        for text in ["lista hojas", "Hojas", "list sheets", " SHEETS "] {
            assert_eq!(parse_command(text), Command::ListSheets, "{text}");
        }
    }

    #[test]
    fn test_unknown() {
        for text in ["hello", "pon 5 en Hoja1", "pon 5 en Hoja1 A0", "delete row x in Sheet1", ""] {
            assert_eq!(parse_command(text), Command::Unknown, "{text}");
        }
    }
}
