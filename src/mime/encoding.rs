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

//! Transfer-encoding decoders as incremental byte-stream transducers.
//!
//! Input arrives in arbitrary chunks (in practice, one line at a time);
//! whatever cannot be decoded yet (a partial base64 quantum, a dangling
//! quoted-printable escape) is carried between calls, so the decoders hold
//! only O(line) state.

use std::borrow::Cow;
use std::io::{self, Read};

use super::header::ContentTransferEncoding;
use super::quoted_printable::qp_decode;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DecoderKind {
    Identity,
    Base64,
    QuotedPrintable,
}

/// An incremental decoder for one body's transfer encoding.
#[derive(Debug)]
pub struct TransferDecoder {
    kind: DecoderKind,
    input_buffer: Vec<u8>,
}

impl TransferDecoder {
    pub fn identity() -> Self {
        TransferDecoder {
            kind: DecoderKind::Identity,
            input_buffer: Vec::new(),
        }
    }

    pub fn for_encoding(cte: ContentTransferEncoding) -> Self {
        let kind = match cte {
            ContentTransferEncoding::SevenBit
            | ContentTransferEncoding::EightBit
            | ContentTransferEncoding::Binary => DecoderKind::Identity,
            ContentTransferEncoding::Base64 => DecoderKind::Base64,
            ContentTransferEncoding::QuotedPrintable => {
                DecoderKind::QuotedPrintable
            },
        };
        TransferDecoder {
            kind,
            input_buffer: Vec::new(),
        }
    }

    /// Decodes a chunk, appending whatever becomes available to `out`.
    pub fn push(&mut self, data: &[u8], out: &mut Vec<u8>) {
        match self.kind {
            DecoderKind::Identity => out.extend_from_slice(data),
            DecoderKind::Base64 => self.push_base64(data, out),
            DecoderKind::QuotedPrintable => self.push_qp(data, out),
        }
    }

    /// Flushes carried state at end of input.
    pub fn finish(&mut self, out: &mut Vec<u8>) {
        match self.kind {
            DecoderKind::Identity => (),
            DecoderKind::Base64 => {
                // Tolerate missing trailing padding by supplying it.
                while !self.input_buffer.is_empty()
                    && 0 != self.input_buffer.len() % 4
                {
                    self.input_buffer.push(b'=');
                }
                let _ = base64::decode_config_buf(
                    &self.input_buffer,
                    base64::STANDARD,
                    out,
                );
                self.input_buffer.clear();
            },
            DecoderKind::QuotedPrintable => {
                // A dangling escape that never completed cannot be made
                // sense of; drop it.
                self.input_buffer.clear();
            },
        }
    }

    fn push_base64(&mut self, data: &[u8], out: &mut Vec<u8>) {
        let mut pushed_any = false;
        for &byte in data {
            match byte {
                b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'+' | b'/'
                | b'=' => {
                    self.input_buffer.push(byte);
                    pushed_any = true;
                },
                _ => (),
            }
        }

        if pushed_any {
            let usable_length = self.input_buffer.len() / 4 * 4;
            let _ = base64::decode_config_buf(
                &self.input_buffer[..usable_length],
                base64::STANDARD,
                out,
            );

            self.input_buffer.copy_within(usable_length.., 0);
            self.input_buffer
                .truncate(self.input_buffer.len() - usable_length);
        }
    }

    fn push_qp(&mut self, data: &[u8], out: &mut Vec<u8>) {
        if self.input_buffer.is_empty() {
            let (decoded, dangling) = qp_decode(data);
            match decoded {
                Cow::Owned(v) => out.extend_from_slice(&v),
                Cow::Borrowed(v) => out.extend_from_slice(v),
            }
            self.input_buffer.extend_from_slice(dangling);
        } else {
            self.input_buffer.extend_from_slice(data);
            let consumed_len = {
                let (decoded, dangling) = qp_decode(&self.input_buffer);
                out.extend_from_slice(&decoded);
                self.input_buffer.len() - dangling.len()
            };

            self.input_buffer.copy_within(consumed_len.., 0);
            self.input_buffer
                .truncate(self.input_buffer.len() - consumed_len);
        }
    }
}

/// An input adapter which transfer-decodes everything read from the
/// underlying source.
pub struct DecodeReader<R> {
    inner: R,
    decoder: TransferDecoder,
    buf: Vec<u8>,
    off: usize,
    done: bool,
}

impl<R: Read> DecodeReader<R> {
    pub fn new(inner: R, cte: ContentTransferEncoding) -> Self {
        DecodeReader {
            inner,
            decoder: TransferDecoder::for_encoding(cte),
            buf: Vec::new(),
            off: 0,
            done: false,
        }
    }
}

impl<R: Read> Read for DecodeReader<R> {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        let mut chunk = [0u8; 1024];
        while self.off == self.buf.len() && !self.done {
            self.buf.clear();
            self.off = 0;

            let nread = self.inner.read(&mut chunk)?;
            if 0 == nread {
                self.decoder.finish(&mut self.buf);
                self.done = true;
            } else {
                self.decoder.push(&chunk[..nread], &mut self.buf);
            }
        }

        let len = dst.len().min(self.buf.len() - self.off);
        dst[..len].copy_from_slice(&self.buf[self.off..self.off + len]);
        self.off += len;
        Ok(len)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mime::header::ContentTransferEncoding as CTE;

    fn decode_chunked(cte: CTE, chunks: &[&[u8]]) -> Vec<u8> {
        let mut decoder = TransferDecoder::for_encoding(cte);
        let mut out = Vec::new();
        for chunk in chunks {
            decoder.push(chunk, &mut out);
        }
        decoder.finish(&mut out);
        out
    }

    #[test]
    fn identity_passthrough() {
        assert_eq!(
            b"foo\xFEbar".to_vec(),
            decode_chunked(CTE::SevenBit, &[b"foo\xFE", b"bar"]),
        );
        assert_eq!(
            b"foo\xFE".to_vec(),
            decode_chunked(CTE::Binary, &[b"foo\xFE"]),
        );
    }

    #[test]
    fn base64_across_chunks() {
        // Quanta split at every possible ragged position, with assorted
        // line-break garbage in between.
        let decoded = decode_chunked(
            CTE::Base64,
            &[
                b"V\r\n",
                b"Gh\n",
                b"hdC\n",
                b"Bpcy\n",
                b"Bub3QgZ\n",
                b"GVhZCB3aGl\n",
                b"jaCBjYW4gZXRl\n",
                b"cm5hbCBsaWUuXG5Bbm\n",
                b"Qgd2l0aCBzdHJhbmdlIOZvb\n",
                b"nMgZXZlbiBkZWF0aCBtYXkgZGllLg==\r\n",
            ],
        );
        assert_eq!(
            b"That is not dead which can eternal lie.\\n\
              And with strange \xE6ons even death may die."
                .to_vec(),
            decoded,
        );
    }

    #[test]
    fn base64_missing_padding() {
        assert_eq!(b"foob".to_vec(), decode_chunked(CTE::Base64, &[b"Zm9vYg"]));
        assert_eq!(b"fo".to_vec(), decode_chunked(CTE::Base64, &[b"Zm8"]));
    }

    #[test]
    fn base64_ignores_foreign_bytes() {
        assert_eq!(
            b"foo".to_vec(),
            decode_chunked(CTE::Base64, &[b"Z m\t9*v\xFF"]),
        );
    }

    #[test]
    fn qp_across_chunks() {
        // The soft line break is split between chunks the way the region
        // cursor splits lines: the ending rides at the head of the next
        // chunk.
        assert_eq!(
            b"That is not dead which can eternal lie.\nAnd with strange \
              \xE6ons even death may die."
                .to_vec(),
            decode_chunked(
                CTE::QuotedPrintable,
                &[
                    b"That is not dead =",
                    b"\nwhich can eternal lie.=0A=",
                    b"\r\nAnd with strange =E6ons =",
                    b"\neven death may die.=",
                ],
            ),
        );
    }

    #[test]
    fn qp_dangling_escape_completes_across_chunks() {
        assert_eq!(
            b"ab\xABcd".to_vec(),
            decode_chunked(CTE::QuotedPrintable, &[b"ab=", b"ABcd"]),
        );
    }

    #[test]
    fn qp_trailing_dangle_discarded() {
        assert_eq!(
            b"foo".to_vec(),
            decode_chunked(CTE::QuotedPrintable, &[b"foo="]),
        );
    }

    #[test]
    fn decode_reader_adapter() {
        let mut out = Vec::new();
        DecodeReader::new(&b"Zm9vYmFy"[..], CTE::Base64)
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(b"foobar".to_vec(), out);
    }
}
