//! PDF text layer extraction.

use crate::error::{Error, Result};

pub(super) fn extract(bytes: &[u8], filename: &str) -> Result<String> {
    let raw = pdf_extract::extract_text_from_mem(bytes).map_err(|e| Error::corrupt(filename, e))?;
    Ok(tidy(&raw))
}

/// Strip trailing whitespace per line and squeeze runs of blank lines
fn tidy(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut blank_run = 0;
    for line in raw.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tidy_squeezes_blank_lines() {
        assert_eq!(tidy("a  \n\n\n\nb\n"), "a\n\nb");
    }
}
