//! Plain text decoding with legacy-encoding fallback.

use encoding_rs::{EUC_KR, Encoding, WINDOWS_1252};

/// Decode bytes as UTF-8 (or the encoding a BOM announces). Invalid UTF-8 is
/// retried as EUC-KR, then as Windows-1252, which accepts any input.
pub(super) fn decode(bytes: &[u8]) -> String {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return text.into_owned();
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }

    let (text, had_errors) = EUC_KR.decode_without_bom_handling(bytes);
    if !had_errors {
        return text.into_owned();
    }

    let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
    text.into_owned()
}
