//! Utility functions and helpers.

pub mod http;
pub mod log;

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of a byte slice.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Whether an upload file name carries a `.pdf` extension (any case).
pub fn is_pdf_filename(name: &str) -> bool {
    name.trim().to_ascii_lowercase().ends_with(".pdf")
}

/// Escape `%`, `_` and the escape character itself for a SQL `LIKE ... ESCAPE '\'`.
pub fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
