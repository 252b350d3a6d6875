//-
// Copyright (c) 2023, Jason Lingle
//
// This file is part of Mimestream.
//
// Mimestream is free software: you can redistribute it and/or modify it under
// the terms of  the GNU General Public  License as published  by the Free
// Software Foundation, either version 3 of  the License, or (at your option)
// any later version.
//
// Mimestream is distributed in the hope that it will be useful,  but WITHOUT
// ANY WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or
// FITNESS FOR  A PARTICULAR  PURPOSE.  See the GNU  General Public  License
// for more details.
//
// You should have received a copy of the GNU General Public License along
// with Mimestream. If not, see <http://www.gnu.org/licenses/>.

use std::borrow::Cow;
use std::io::{self, Read};
use std::str;

/// Decodes quoted-printable encoding, as described by RFC 2045.
///
/// Encoded bytes and soft line endings are both handled, the latter by
/// discarding. UNIX line endings are handled as well as DOS line endings.
///
/// This never fails. Invalid sequences are passed through untransformed.
/// Certain restrictions, such as not having trailing whitespace on a line,
/// are not enforced, and are passed through. 8-bit characters are passed
/// through, including invalid UTF-8.
///
/// Returns the decoded text, as well as a possible "dangling" slice, which
/// represents a QP escape sequence that is not yet complete.
pub fn qp_decode(s: &[u8]) -> (Cow<[u8]>, &[u8]) {
    let mut transformed = Vec::new();
    let mut dangling: Option<&[u8]> = None;

    let mut split = s.split(|&b| b'=' == b);
    let mut prefix = split.next();

    for element in split {
        if let Some(prefix) = prefix.take() {
            transformed.extend_from_slice(prefix);
        }

        if let Some(dangling) = dangling.take() {
            transformed.push(b'=');
            transformed.extend_from_slice(dangling);
        }

        if element.is_empty() {
            dangling = Some(element);
            continue;
        }

        if b'\n' == element[0] {
            // Soft line break with UNIX ending, discard
            transformed.extend_from_slice(&element[1..]);
            continue;
        }

        // All other = sequences are two bytes long
        if element.len() < 2 {
            dangling = Some(element);
            continue;
        }

        let encoded = &element[..2];
        let tail = &element[2..];
        if b"\r\n" == encoded {
            // Soft line break with DOS ending, discard
            transformed.extend_from_slice(tail);
            continue;
        }

        if let Some(ch) = str::from_utf8(encoded)
            .ok()
            .and_then(|e| u8::from_str_radix(e, 16).ok())
        {
            // Valid encoded byte
            transformed.push(ch);
            transformed.extend_from_slice(tail);
        } else {
            // Invalid encoding, just push the whole string verbatim
            transformed.push(b'=');
            transformed.extend_from_slice(element);
        }
    }

    if transformed.is_empty() {
        (Cow::Borrowed(s), &[])
    } else {
        (
            Cow::Owned(transformed),
            dangling.map(|d| &s[s.len() - d.len() - 1..]).unwrap_or(&[]),
        )
    }
}

/// Maximum output line length, including a trailing soft-break `=`.
const LINE_LIMIT: usize = 76;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Streaming quoted-printable encoder.
///
/// Two modes exist, differing in how whitespace and line breaks are treated:
///
/// - **Text** (`QpEncoder::text()`): space and tab are emitted literally
///   except as the final byte of a line, where they are escaped; CR, LF, and
///   CRLF in the input all become canonical hard CRLF line endings.
/// - **Binary** (`QpEncoder::binary()`): space, tab, CR and LF are escaped
///   like any other unsafe byte, and the only line breaks in the output are
///   soft breaks.
///
/// In both modes output lines never exceed 76 characters (including the `=`
/// of a soft break) and an escape sequence is never split across a break.
#[derive(Clone, Debug)]
pub struct QpEncoder {
    binary: bool,
    line_len: usize,
    pending_ws: Option<u8>,
    last_cr: bool,
}

impl QpEncoder {
    pub fn text() -> Self {
        QpEncoder {
            binary: false,
            line_len: 0,
            pending_ws: None,
            last_cr: false,
        }
    }

    pub fn binary() -> Self {
        QpEncoder {
            binary: true,
            line_len: 0,
            pending_ws: None,
            last_cr: false,
        }
    }

    /// Encodes `data`, appending the output to `out`.
    pub fn push(&mut self, data: &[u8], out: &mut Vec<u8>) {
        for &b in data {
            self.push_byte(b, out);
        }
    }

    /// Flushes any held state. Must be called once after the final `push`.
    pub fn finish(&mut self, out: &mut Vec<u8>) {
        // Trailing whitespace ends a line, so it must be escaped.
        self.flush_ws(true, out);
        self.last_cr = false;
    }

    fn push_byte(&mut self, b: u8, out: &mut Vec<u8>) {
        if self.binary {
            match b {
                33..=60 | 62..=126 => self.literal(b, out),
                _ => self.escape(b, out),
            }
            return;
        }

        if self.last_cr {
            self.last_cr = false;
            if b'\n' == b {
                // The LF of a CRLF pair; the break was already emitted.
                return;
            }
        }

        match b {
            b'\r' => {
                self.flush_ws(true, out);
                self.hard_break(out);
                self.last_cr = true;
            },
            b'\n' => {
                self.flush_ws(true, out);
                self.hard_break(out);
            },
            b' ' | b'\t' => {
                self.flush_ws(false, out);
                self.pending_ws = Some(b);
            },
            33..=60 | 62..=126 => {
                self.flush_ws(false, out);
                self.literal(b, out);
            },
            _ => {
                self.flush_ws(false, out);
                self.escape(b, out);
            },
        }
    }

    // Whitespace is held back one byte because its encoding depends on
    // whether a line break comes next.
    fn flush_ws(&mut self, at_line_end: bool, out: &mut Vec<u8>) {
        if let Some(ws) = self.pending_ws.take() {
            if at_line_end {
                self.escape(ws, out);
            } else {
                self.literal(ws, out);
            }
        }
    }

    fn literal(&mut self, b: u8, out: &mut Vec<u8>) {
        self.reserve(1, out);
        out.push(b);
        self.line_len += 1;
    }

    fn escape(&mut self, b: u8, out: &mut Vec<u8>) {
        self.reserve(3, out);
        out.push(b'=');
        out.push(HEX_DIGITS[usize::from(b >> 4)]);
        out.push(HEX_DIGITS[usize::from(b & 0xF)]);
        self.line_len += 3;
    }

    fn reserve(&mut self, width: usize, out: &mut Vec<u8>) {
        if self.line_len + width > LINE_LIMIT - 1 {
            out.extend_from_slice(b"=\r\n");
            self.line_len = 0;
        }
    }

    fn hard_break(&mut self, out: &mut Vec<u8>) {
        out.extend_from_slice(b"\r\n");
        self.line_len = 0;
    }
}

/// Quoted-printable-encodes the whole of `data` in text mode.
pub fn qp_encode(data: &[u8]) -> Vec<u8> {
    let mut encoder = QpEncoder::text();
    let mut out = Vec::with_capacity(data.len() + data.len() / 32);
    encoder.push(data, &mut out);
    encoder.finish(&mut out);
    out
}

/// Quoted-printable-encodes the whole of `data` in binary mode.
pub fn qp_encode_binary(data: &[u8]) -> Vec<u8> {
    let mut encoder = QpEncoder::binary();
    let mut out = Vec::with_capacity(data.len() * 3);
    encoder.push(data, &mut out);
    encoder.finish(&mut out);
    out
}

/// An input adapter which quoted-printable-encodes everything read from the
/// underlying source.
pub struct QpEncodeReader<R> {
    inner: R,
    encoder: QpEncoder,
    buf: Vec<u8>,
    off: usize,
    done: bool,
}

impl<R: Read> QpEncodeReader<R> {
    pub fn text(inner: R) -> Self {
        Self::new(inner, QpEncoder::text())
    }

    pub fn binary(inner: R) -> Self {
        Self::new(inner, QpEncoder::binary())
    }

    fn new(inner: R, encoder: QpEncoder) -> Self {
        QpEncodeReader {
            inner,
            encoder,
            buf: Vec::new(),
            off: 0,
            done: false,
        }
    }
}

impl<R: Read> Read for QpEncodeReader<R> {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        let mut chunk = [0u8; 1024];
        while self.off == self.buf.len() && !self.done {
            self.buf.clear();
            self.off = 0;

            let nread = self.inner.read(&mut chunk)?;
            if 0 == nread {
                self.encoder.finish(&mut self.buf);
                self.done = true;
            } else {
                self.encoder.push(&chunk[..nread], &mut self.buf);
            }
        }

        let len = dst.len().min(self.buf.len() - self.off);
        dst[..len].copy_from_slice(&self.buf[self.off..self.off + len]);
        self.off += len;
        Ok(len)
    }
}
