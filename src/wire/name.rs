// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Percent-escaping for node path segments.
//!
//! Mirrors `nodes.CreateName`/banned-char table in the original Go SDK
//! (`examples/original_source/nodes/namer.go`), except dots are not escaped
//! here — the distilled spec carves that exception out explicitly.

const BANNED: &[char] = &['%', '/', '\\', '?', '*', ':', '|', '<', '>', '$', '@', '\'', '"'];

/// Percent-escape a node name so it is safe to use as a path segment.
///
/// Already-escaped `%XX` sequences are passed through unchanged; dots are
/// never escaped.
pub fn encode_name(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '%' {
            let mut lookahead = chars.clone();
            let h1 = lookahead.next();
            let h2 = lookahead.next();
            if let (Some(a), Some(b)) = (h1, h2) {
                if a.is_ascii_hexdigit() && b.is_ascii_hexdigit() {
                    out.push('%');
                    out.push(a.to_ascii_uppercase());
                    out.push(b.to_ascii_uppercase());
                    chars.next();
                    chars.next();
                    continue;
                }
            }
        }

        if BANNED.contains(&c) {
            for byte in c.to_string().as_bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        } else {
            out.push(c);
        }
    }

    out
}

/// Reverse `encode_name`, decoding any `%XX` escape sequences.
pub fn decode_name(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = &input[i + 1..i + 3];
            if let Ok(byte) = u8::from_str_radix(hex, 16) {
                decoded.push(byte);
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}
