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
// You should have received a copy of the GNU General Public License along with
// Mimestream. If not, see <http://www.gnu.org/licenses/>.

//! Pulling logical lines off a raw byte source.

use std::io::{BufRead, Read};

use crate::support::error::Error;

/// A location in the raw input, updated as bytes are consumed.
///
/// `line` is incremented on every LF (DOS or UNIX ending); `column` counts
/// bytes since the last line ending.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Position {
    pub byte_offset: u64,
    pub line: u64,
    pub column: u64,
}

impl Position {
    fn advance(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.byte_offset += 1;
            if b'\n' == b {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
    }
}

/// Pull interface over a byte source which yields logical lines.
///
/// A logical line includes its trailing line ending ("\r\n" or bare "\n") if
/// present; the final line of the input is returned once even if it has no
/// ending. Bytes which are not line endings, including bare CR, pass through
/// untouched. One line of lookahead is supported via `peek_line()`.
///
/// Lines longer than the configured maximum fail with `LineTooLong` rather
/// than buffering without bound.
pub struct LineBuffer<R> {
    src: R,
    peeked: Option<Vec<u8>>,
    pos: Position,
    max_line: usize,
    eof: bool,
}

impl<R: BufRead> LineBuffer<R> {
    pub fn new(src: R, max_line: usize) -> Self {
        LineBuffer {
            src,
            peeked: None,
            pos: Position::default(),
            max_line,
            eof: false,
        }
    }

    /// Returns the position of the next unconsumed byte.
    ///
    /// Peeking does not affect the position.
    pub fn position(&self) -> Position {
        self.pos
    }

    /// Returns the next logical line without consuming it, or `None` at EOF.
    pub fn peek_line(&mut self) -> Result<Option<&[u8]>, Error> {
        self.fill_peek()?;
        Ok(self.peeked.as_deref())
    }

    /// Consumes and returns the next logical line, or `None` at EOF.
    pub fn read_line(&mut self) -> Result<Option<Vec<u8>>, Error> {
        self.fill_peek()?;
        let line = self.peeked.take();
        if let Some(ref line) = line {
            self.pos.advance(line);
        }
        Ok(line)
    }

    fn fill_peek(&mut self) -> Result<(), Error> {
        if self.peeked.is_some() || self.eof {
            return Ok(());
        }

        let mut buf = Vec::new();
        (&mut self.src)
            .take(self.max_line as u64)
            .read_until(b'\n', &mut buf)?;

        if buf.is_empty() {
            self.eof = true;
        } else if buf.len() >= self.max_line && Some(&b'\n') != buf.last() {
            // The line was cut short by the cap, not by EOF or an ending.
            return Err(Error::LineTooLong);
        } else {
            self.peeked = Some(buf);
        }

        Ok(())
    }
}

/// Anything that can serve logical lines with one line of lookahead.
///
/// Implemented by `LineBuffer` for the raw source and by the layered input
/// stack for transfer-decoded views of it.
pub trait LineSource {
    fn peek_line(&mut self) -> Result<Option<&[u8]>, Error>;
    fn read_line(&mut self) -> Result<Option<Vec<u8>>, Error>;
}

impl<R: BufRead> LineSource for LineBuffer<R> {
    fn peek_line(&mut self) -> Result<Option<&[u8]>, Error> {
        LineBuffer::peek_line(self)
    }

    fn read_line(&mut self) -> Result<Option<Vec<u8>>, Error> {
        LineBuffer::read_line(self)
    }
}

/// Splits a logical line into its content and its line ending.
pub fn split_ending(line: &[u8]) -> (&[u8], &'static [u8]) {
    if line.ends_with(b"\r\n") {
        (&line[..line.len() - 2], b"\r\n")
    } else if line.ends_with(b"\n") {
        (&line[..line.len() - 1], b"\n")
    } else {
        (line, b"")
    }
}
