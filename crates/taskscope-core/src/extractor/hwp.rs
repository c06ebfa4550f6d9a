//! Best-effort HWP extraction.
//!
//! HWP files are compound binaries with compressed body streams, so there is no
//! faithful text layer to read here. We scan the raw bytes for readable runs of
//! Hangul and ASCII instead, and fall back to a descriptive placeholder so the
//! analysis engine still has something to work with. This never fails.

use std::collections::HashSet;
use std::sync::LazyLock;

use encoding_rs::UTF_16LE;
use regex::Regex;

const PARTIAL_HEADER: &str = "[Text extracted from HWP document; content may be partial]";

static READABLE_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[가-힣]+(?:[ \t]+[가-힣0-9]+)*|[A-Za-z][A-Za-z0-9 .,!?()'-]*[A-Za-z0-9.)]")
        .unwrap_or_else(|e| unreachable!("static pattern: {e}"))
});

/// Stop collecting once this much text is gathered. The analysis engine
/// only reads the first few thousand characters.
const MAX_OUTPUT_CHARS: usize = 32 * 1024;

/// Distinct readable runs, in order of first appearance
#[derive(Default)]
struct Runs {
    seen: HashSet<String>,
    ordered: Vec<String>,
    chars: usize,
}

impl Runs {
    fn is_full(&self) -> bool {
        self.chars >= MAX_OUTPUT_CHARS
    }

    fn push(&mut self, run: &str) {
        if self.seen.insert(run.to_string()) {
            self.chars += run.chars().count() + 1;
            self.ordered.push(run.to_string());
        }
    }
}

pub(super) fn extract(bytes: &[u8], filename: &str) -> String {
    let mut runs = Runs::default();

    let lossy = String::from_utf8_lossy(bytes);
    collect_runs(&lossy, &mut runs);

    if !runs.is_full() {
        let (wide, _) = UTF_16LE.decode_without_bom_handling(bytes);
        collect_runs(&wide, &mut runs);
    }

    if runs.ordered.is_empty() {
        return placeholder(filename, bytes.len());
    }
    format!("{}\n{}", PARTIAL_HEADER, runs.ordered.join(" "))
}

fn collect_runs(haystack: &str, runs: &mut Runs) {
    for m in READABLE_RUN.find_iter(haystack) {
        if runs.is_full() {
            return;
        }
        let run = m.as_str().trim();
        if run.chars().count() > 1 {
            runs.push(run);
        }
    }
}

fn placeholder(filename: &str, size: usize) -> String {
    format!(
        "[HWP document: {} ({} KB). Text could not be extracted automatically; \
         convert the file to DOCX or PDF for a complete analysis.]",
        filename,
        size.div_ceil(1024)
    )
}
