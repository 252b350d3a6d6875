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

//! The layered input the token stream reads lines from.
//!
//! Layer 0 is the raw byte source. Entering a `message/rfc822` body pushes a
//! decode layer: a bounded view of the enclosing region, run through the
//! body's transfer decoder and re-split into logical lines. The embedded
//! message's own boundaries only exist in decoded form, so all parsing above
//! the layer sees exactly the bytes it would have seen had the inner message
//! arrived unencoded; the enclosing boundaries terminate the layer's region
//! below the decoder, which the layer surfaces as EOF.

use std::io::BufRead;
use std::mem;

use memchr::memchr;

use super::boundary::{RegionCursor, RegionEnd};
use super::encoding::TransferDecoder;
use super::line::{LineBuffer, LineSource, Position};
use crate::support::error::Error;

pub(super) struct DecodeLayer {
    cursor: RegionCursor,
    decoder: TransferDecoder,
    /// Decoded bytes not yet split into lines.
    buf: Vec<u8>,
    peeked: Option<Vec<u8>>,
    /// The region below has ended and the decoder has been flushed.
    source_done: bool,
    eof: bool,
}

pub(super) struct InputStack<R> {
    root: LineBuffer<R>,
    layers: Vec<DecodeLayer>,
    max_line: usize,
}

impl<R: BufRead> InputStack<R> {
    pub fn new(src: R, max_line: usize) -> Self {
        InputStack {
            root: LineBuffer::new(src, max_line),
            layers: Vec::new(),
            max_line,
        }
    }

    /// Position within the raw input. Decoded layers do not have positions
    /// of their own; their consumption advances the raw position.
    pub fn position(&self) -> Position {
        self.root.position()
    }

    /// The current layer index; 0 is the raw source.
    pub fn top(&self) -> usize {
        self.layers.len()
    }

    pub fn push_layer(
        &mut self,
        cursor: RegionCursor,
        decoder: TransferDecoder,
    ) {
        self.layers.push(DecodeLayer {
            cursor,
            decoder,
            buf: Vec::new(),
            peeked: None,
            source_done: false,
            eof: false,
        });
    }

    /// Removes the top decode layer, consuming whatever is left of its
    /// underlying region, and reports how that region ended.
    pub fn pop_layer(&mut self) -> Result<RegionEnd, Error> {
        let mut layer = match self.layers.pop() {
            Some(layer) => layer,
            None => return Ok(RegionEnd::Eof),
        };

        let mut below = StackView {
            root: &mut self.root,
            layers: &mut self.layers,
            max_line: self.max_line,
        };
        layer.cursor.drain(&mut below)
    }

    /// A `LineSource` view of the whole stack.
    pub fn view(&mut self) -> StackView<'_, R> {
        StackView {
            root: &mut self.root,
            layers: &mut self.layers,
            max_line: self.max_line,
        }
    }
}

/// A borrowed prefix of the input stack, serving lines from its top layer.
pub(super) struct StackView<'a, R> {
    root: &'a mut LineBuffer<R>,
    layers: &'a mut [DecodeLayer],
    max_line: usize,
}

impl<'a, R: BufRead> StackView<'a, R> {
    fn fill(&mut self) -> Result<(), Error> {
        fill_top(self.root, self.layers, self.max_line)
    }
}

impl<'a, R: BufRead> LineSource for StackView<'a, R> {
    fn peek_line(&mut self) -> Result<Option<&[u8]>, Error> {
        self.fill()?;
        match self.layers.last() {
            None => self.root.peek_line(),
            Some(top) => Ok(top.peeked.as_deref()),
        }
    }

    fn read_line(&mut self) -> Result<Option<Vec<u8>>, Error> {
        self.fill()?;
        match self.layers.last_mut() {
            None => self.root.read_line(),
            Some(top) => Ok(top.peeked.take()),
        }
    }
}

/// Ensures the top layer has a line peeked or is at EOF.
///
/// Recurses towards the root: the top layer's region cursor pulls chunks
/// from the view of the stack below it.
fn fill_top<R: BufRead>(
    root: &mut LineBuffer<R>,
    layers: &mut [DecodeLayer],
    max_line: usize,
) -> Result<(), Error> {
    let (top, rest) = match layers.split_last_mut() {
        // The root line buffer peeks for itself.
        None => return Ok(()),
        Some(split) => split,
    };

    if top.peeked.is_some() || top.eof {
        return Ok(());
    }

    loop {
        if let Some(ix) = memchr(b'\n', &top.buf) {
            let tail = top.buf.split_off(ix + 1);
            let line = mem::replace(&mut top.buf, tail);
            top.peeked = Some(line);
            return Ok(());
        }

        if top.source_done {
            if top.buf.is_empty() {
                top.eof = true;
            } else {
                // Final decoded line with no terminator.
                top.peeked = Some(mem::replace(&mut top.buf, Vec::new()));
            }
            return Ok(());
        }

        let mut below = StackView {
            root: &mut *root,
            layers: &mut *rest,
            max_line,
        };
        match top.cursor.next_chunk(&mut below)? {
            Some(chunk) => {
                top.decoder.push(&chunk, &mut top.buf);
                if top.buf.len() > max_line {
                    return Err(Error::LineTooLong);
                }
            },
            None => {
                top.decoder.finish(&mut top.buf);
                top.source_done = true;
            },
        }
    }
}

#[cfg(test)]
mod test {
    use std::io;

    use super::*;
    use crate::mime::boundary::{BoundaryHit, RegionCursor};
    use crate::mime::header::ContentTransferEncoding as CTE;

    fn stack(data: &[u8]) -> InputStack<io::BufReader<io::Cursor<Vec<u8>>>> {
        InputStack::new(
            io::BufReader::with_capacity(8, io::Cursor::new(data.to_vec())),
            4096,
        )
    }

    fn boundaries(names: &[&str]) -> Vec<Vec<u8>> {
        names
            .iter()
            .map(|n| crate::mime::boundary::delimiter_for(n))
            .collect()
    }

    fn lines_until_eof<R: io::BufRead>(
        input: &mut InputStack<R>,
    ) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();
        let mut view = input.view();
        while let Some(line) = view.read_line().unwrap() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn identity_layer_bounded_by_region() {
        let mut input = stack(b"one\r\ntwo\r\n--b\r\nafter\r\n");
        input.push_layer(
            RegionCursor::new(boundaries(&["b"])),
            TransferDecoder::identity(),
        );

        // The CRLF before the boundary belongs to the boundary, so the
        // region's final line has no terminator.
        assert_eq!(
            vec![b"one\r\n".to_vec(), b"two".to_vec()],
            lines_until_eof(&mut input),
        );
        assert_eq!(
            RegionEnd::Boundary(BoundaryHit {
                depth: 0,
                close: false
            }),
            input.pop_layer().unwrap(),
        );
        assert_eq!(
            vec![b"after\r\n".to_vec()],
            lines_until_eof(&mut input),
        );
    }

    #[test]
    fn quoted_printable_layer_reassembles_lines() {
        // A soft break inside a line and an encoded CRLF spanning it.
        let mut input =
            stack(b"line =\r\none=0D=0Aline two\r\n--b--\r\n");
        input.push_layer(
            RegionCursor::new(boundaries(&["b"])),
            TransferDecoder::for_encoding(CTE::QuotedPrintable),
        );

        assert_eq!(
            vec![b"line one\r\n".to_vec(), b"line two".to_vec()],
            lines_until_eof(&mut input),
        );
        assert_eq!(
            RegionEnd::Boundary(BoundaryHit {
                depth: 0,
                close: true
            }),
            input.pop_layer().unwrap(),
        );
    }

    #[test]
    fn base64_layer_reassembles_lines() {
        // base64 of "hello\r\nworld\r\n", split over two source lines.
        let mut input = stack(b"aGVsbG8NCndv\r\ncmxkDQo=\r\n");
        input.push_layer(
            RegionCursor::new(Vec::new()),
            TransferDecoder::for_encoding(CTE::Base64),
        );

        assert_eq!(
            vec![b"hello\r\n".to_vec(), b"world\r\n".to_vec()],
            lines_until_eof(&mut input),
        );
        assert_eq!(RegionEnd::Eof, input.pop_layer().unwrap());
    }

    #[test]
    fn pop_layer_drains_unread_region() {
        let mut input = stack(b"skipped\r\nalso skipped\r\n--b\r\nnext\r\n");
        input.push_layer(
            RegionCursor::new(boundaries(&["b"])),
            TransferDecoder::identity(),
        );
        assert_eq!(
            RegionEnd::Boundary(BoundaryHit {
                depth: 0,
                close: false
            }),
            input.pop_layer().unwrap(),
        );
        assert_eq!(vec![b"next\r\n".to_vec()], lines_until_eof(&mut input));
    }

    #[test]
    fn nested_layers() {
        // An identity layer bounded by "outer" containing another identity
        // layer bounded by "inner".
        let mut input = stack(
            b"deep\r\n--inner\r\nmid\r\n--outer\r\nraw\r\n",
        );
        input.push_layer(
            RegionCursor::new(boundaries(&["outer"])),
            TransferDecoder::identity(),
        );
        input.push_layer(
            RegionCursor::new(boundaries(&["inner"])),
            TransferDecoder::identity(),
        );

        assert_eq!(vec![b"deep".to_vec()], lines_until_eof(&mut input));
        assert_eq!(
            RegionEnd::Boundary(BoundaryHit {
                depth: 0,
                close: false
            }),
            input.pop_layer().unwrap(),
        );
        assert_eq!(vec![b"mid".to_vec()], lines_until_eof(&mut input));
        assert_eq!(
            RegionEnd::Boundary(BoundaryHit {
                depth: 0,
                close: false
            }),
            input.pop_layer().unwrap(),
        );
        assert_eq!(vec![b"raw\r\n".to_vec()], lines_until_eof(&mut input));
    }
}
