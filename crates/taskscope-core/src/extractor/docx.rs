//! Word processor (.docx) extraction.

use std::io::{Cursor, Read};

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::{Error, Result};

const DOCUMENT_PART: &str = "word/document.xml";

/// Largest uncompressed document part we will inflate
const MAX_DOCUMENT_XML: u64 = 64 * 1024 * 1024;

pub(super) fn extract(bytes: &[u8], filename: &str) -> Result<String> {
    extract_limited(bytes, filename, MAX_DOCUMENT_XML)
}

fn extract_limited(bytes: &[u8], filename: &str, limit: u64) -> Result<String> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| Error::corrupt(filename, e))?;

    let entry = archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| Error::corrupt(filename, format!("{}: {}", DOCUMENT_PART, e)))?;

    let mut xml = String::new();
    entry
        .take(limit + 1)
        .read_to_string(&mut xml)
        .map_err(|e| Error::corrupt(filename, e))?;
    if xml.len() as u64 > limit {
        return Err(Error::corrupt(
            filename,
            format!("{} expands beyond {} bytes", DOCUMENT_PART, limit),
        ));
    }

    document_text(&xml).map_err(|e| Error::corrupt(filename, e))
}

/// Collect `w:t` runs. Paragraphs and breaks become newlines, tabs stay tabs.
fn document_text(xml: &str) -> std::result::Result<String, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_text = true,
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text => out.push_str(&t.unescape()?),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(out.trim_end().to_string())
}
