//! Spreadsheet (.xlsx / .xls) extraction.

use std::io::Cursor;

use calamine::{Data, Range, Reader, open_workbook_auto_from_rs};

use crate::error::{Error, Result};

pub(super) fn extract(bytes: &[u8], filename: &str) -> Result<String> {
    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).map_err(|e| Error::corrupt(filename, e))?;

    let mut sections = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| Error::corrupt(filename, format!("sheet '{}': {}", name, e)))?;
        sections.push(render_sheet(&name, &range));
    }

    Ok(sections.join("\n\n"))
}

/// `[sheet]` header, then one line per non-empty row with cells tab-joined
fn render_sheet(name: &str, range: &Range<Data>) -> String {
    let mut out = format!("[{}]", name);
    for row in range.rows() {
        if row.iter().all(|c| matches!(c, Data::Empty)) {
            continue;
        }
        let cells: Vec<String> = row
            .iter()
            .map(|c| match c {
                Data::Empty => String::new(),
                other => other.to_string().trim().to_string(),
            })
            .collect();
        out.push('\n');
        out.push_str(&cells.join("\t"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_sheet_skips_empty_rows() {
        let mut range: Range<Data> = Range::new((0, 0), (2, 1));
        range.set_value((0, 0), Data::String("Task".into()));
        range.set_value((0, 1), Data::String("Hours".into()));
        range.set_value((2, 0), Data::String("Invoice matching".into()));
        range.set_value((2, 1), Data::Float(2.5));

        let text = render_sheet("Weekly", &range);
        assert_eq!(text, "[Weekly]\nTask\tHours\nInvoice matching\t2.5");
    }

    #[test]
    fn test_not_a_workbook() {
        let err = extract(b"plain bytes", "book.xlsx").unwrap_err();
        assert!(matches!(err, Error::CorruptDocument { .. }));
    }
}
