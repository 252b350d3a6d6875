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

//! Multipart boundary detection and the bounded region reader built on it.

use super::line::{split_ending, LineSource};
use crate::support::error::Error;

/// A boundary line recognised while scanning a region.
///
/// `depth` indexes into the active boundary stack, outermost first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundaryHit {
    pub depth: usize,
    pub close: bool,
}

/// Why a region stopped producing content.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionEnd {
    Boundary(BoundaryHit),
    Eof,
}

/// Builds the on-the-wire delimiter prefix (`--` + boundary) for a boundary
/// parameter value.
pub fn delimiter_for(boundary: &str) -> Vec<u8> {
    let mut delim = Vec::with_capacity(boundary.len() + 2);
    delim.extend_from_slice(b"--");
    delim.extend_from_slice(boundary.as_bytes());
    delim
}

/// Tests a line against the active boundary stack.
///
/// `boundaries` holds `--`-prefixed delimiter strings, outermost first; they
/// are tested innermost first, so when a prefix relationship between two
/// active boundaries makes a line ambiguous, the deepest frame wins.
///
/// A delimiter allows only LWSP between the boundary and the line ending; a
/// close-delimiter requires `--` after the boundary and tolerates anything
/// after that up to the line ending.
pub fn classify_boundary(
    line: &[u8],
    boundaries: &[Vec<u8>],
) -> Option<BoundaryHit> {
    let (content, _) = split_ending(line);

    for depth in (0..boundaries.len()).rev() {
        let delim = &boundaries[depth];
        if !content.starts_with(delim) {
            continue;
        }

        let rest = &content[delim.len()..];
        if rest.starts_with(b"--") {
            return Some(BoundaryHit { depth, close: true });
        }
        if rest.iter().all(|&b| b' ' == b || b'\t' == b) {
            return Some(BoundaryHit {
                depth,
                close: false,
            });
        }
    }

    None
}

/// A bounded reader over one region of the input: a body, preamble, or
/// epilogue.
///
/// Content is produced line by line. The line ending preceding each line is
/// withheld until the next line proves not to be a boundary; this way the
/// CRLF that introduces a boundary is never attributed to the region, while
/// a region running to EOF keeps its final line ending.
///
/// A boundary is only recognised at the start of the region or after a line
/// ending, both of which are structural givens of the line-oriented scan.
#[derive(Debug)]
pub struct RegionCursor {
    boundaries: Vec<Vec<u8>>,
    held: &'static [u8],
    first: bool,
    pushback: Option<Vec<u8>>,
    end: Option<RegionEnd>,
}

impl RegionCursor {
    pub fn new(boundaries: Vec<Vec<u8>>) -> Self {
        RegionCursor {
            boundaries,
            held: b"",
            first: true,
            pushback: None,
            end: None,
        }
    }

    /// How the region ended, if it has.
    pub fn end(&self) -> Option<RegionEnd> {
        self.end
    }

    /// Returns a previously produced chunk to the cursor, to be yielded
    /// again by the next `next_chunk()` call.
    pub fn unread(&mut self, chunk: Vec<u8>) {
        debug_assert!(self.pushback.is_none());
        self.pushback = Some(chunk);
    }

    /// Produces the next chunk of region content, or `None` once the region
    /// has ended (see `end()` for why).
    ///
    /// Chunks are the contents of single lines, possibly prefixed by the
    /// withheld ending of the previous line; an empty chunk is possible and
    /// does not mean end-of-region.
    pub fn next_chunk(
        &mut self,
        src: &mut impl LineSource,
    ) -> Result<Option<Vec<u8>>, Error> {
        if let Some(chunk) = self.pushback.take() {
            return Ok(Some(chunk));
        }
        if self.end.is_some() {
            return Ok(None);
        }

        let hit = match src.peek_line()? {
            None => {
                if !self.held.is_empty() {
                    // EOF: the final line ending belongs to the region.
                    let held = self.held;
                    self.held = b"";
                    return Ok(Some(held.to_vec()));
                }
                self.end = Some(RegionEnd::Eof);
                return Ok(None);
            },
            Some(line) => {
                if self.first || !self.held.is_empty() {
                    classify_boundary(line, &self.boundaries)
                } else {
                    None
                }
            },
        };

        if let Some(hit) = hit {
            // The boundary line and the withheld ending before it are
            // structure, not content.
            src.read_line()?;
            self.held = b"";
            self.end = Some(RegionEnd::Boundary(hit));
            return Ok(None);
        }

        let line = match src.read_line()? {
            Some(line) => line,
            None => return Ok(None),
        };
        let (content, ending) = split_ending(&line);
        let mut chunk = Vec::with_capacity(self.held.len() + content.len());
        chunk.extend_from_slice(self.held);
        chunk.extend_from_slice(content);
        self.held = ending;
        self.first = false;
        Ok(Some(chunk))
    }

    /// Consumes and discards whatever remains of the region, returning how
    /// it ended.
    pub fn drain(
        &mut self,
        src: &mut impl LineSource,
    ) -> Result<RegionEnd, Error> {
        loop {
            if let Some(end) = self.end {
                if self.pushback.is_none() {
                    return Ok(end);
                }
            }
            self.next_chunk(src)?;
        }
    }
}

#[cfg(test)]
mod test {
    use std::io;

    use super::*;
    use crate::mime::line::LineBuffer;

    fn bounds(names: &[&str]) -> Vec<Vec<u8>> {
        names.iter().map(|n| delimiter_for(n)).collect()
    }

    #[test]
    fn classify_delimiters() {
        let bs = bounds(&["1729"]);
        assert_eq!(
            Some(BoundaryHit {
                depth: 0,
                close: false
            }),
            classify_boundary(b"--1729\r\n", &bs),
        );
        assert_eq!(
            Some(BoundaryHit {
                depth: 0,
                close: false
            }),
            classify_boundary(b"--1729 \t \r\n", &bs),
        );
        assert_eq!(
            Some(BoundaryHit {
                depth: 0,
                close: true
            }),
            classify_boundary(b"--1729--\r\n", &bs),
        );
        // Trailing garbage after a close-delimiter is ignored.
        assert_eq!(
            Some(BoundaryHit {
                depth: 0,
                close: true
            }),
            classify_boundary(b"--1729-- such garbage\r\n", &bs),
        );
        // A close-delimiter right at EOF has no line ending.
        assert_eq!(
            Some(BoundaryHit {
                depth: 0,
                close: true
            }),
            classify_boundary(b"--1729--", &bs),
        );
        assert_eq!(None, classify_boundary(b"--1729x\r\n", &bs));
        assert_eq!(None, classify_boundary(b"--172\r\n", &bs));
        assert_eq!(None, classify_boundary(b"x--1729\r\n", &bs));
    }

    #[test]
    fn classify_depth_and_tie_breaking() {
        let bs = bounds(&["outer", "inner"]);
        assert_eq!(
            Some(BoundaryHit {
                depth: 0,
                close: false
            }),
            classify_boundary(b"--outer\r\n", &bs),
        );
        assert_eq!(
            Some(BoundaryHit {
                depth: 1,
                close: false
            }),
            classify_boundary(b"--inner\r\n", &bs),
        );

        // "ab--x" as the inner boundary makes "--ab--x" both an inner
        // delimiter and an outer close-delimiter; the innermost frame wins.
        let bs = bounds(&["ab", "ab--x"]);
        assert_eq!(
            Some(BoundaryHit {
                depth: 1,
                close: false
            }),
            classify_boundary(b"--ab--x\r\n", &bs),
        );
    }

    fn cursor_over(
        data: &[u8],
        boundaries: &[&str],
    ) -> (
        RegionCursor,
        LineBuffer<io::BufReader<io::Cursor<Vec<u8>>>>,
    ) {
        let lb = LineBuffer::new(
            io::BufReader::with_capacity(8, io::Cursor::new(data.to_vec())),
            1024,
        );
        (RegionCursor::new(bounds(boundaries)), lb)
    }

    fn collect_region(
        data: &[u8],
        boundaries: &[&str],
    ) -> (Vec<u8>, RegionEnd) {
        let (mut cursor, mut lb) = cursor_over(data, boundaries);
        let mut content = Vec::new();
        while let Some(chunk) = cursor.next_chunk(&mut lb).unwrap() {
            content.extend_from_slice(&chunk);
        }
        (content, cursor.end().unwrap())
    }

    #[test]
    fn region_to_eof_keeps_final_ending() {
        let (content, end) = collect_region(b"foo\r\nbar\r\n", &[]);
        assert_eq!(b"foo\r\nbar\r\n".to_vec(), content);
        assert_eq!(RegionEnd::Eof, end);
    }

    #[test]
    fn region_ends_before_boundary_crlf() {
        let (content, end) =
            collect_region(b"foo\r\nbar\r\n--b\r\ntail\r\n", &["b"]);
        assert_eq!(b"foo\r\nbar".to_vec(), content);
        assert_eq!(
            RegionEnd::Boundary(BoundaryHit {
                depth: 0,
                close: false
            }),
            end,
        );
    }

    #[test]
    fn boundary_at_region_start() {
        let (content, end) = collect_region(b"--b\r\nrest\r\n", &["b"]);
        assert!(content.is_empty());
        assert_eq!(
            RegionEnd::Boundary(BoundaryHit {
                depth: 0,
                close: false
            }),
            end,
        );
    }

    #[test]
    fn boundary_mid_line_is_content() {
        let (content, end) = collect_region(b"x --b y\r\n--b--\r\n", &["b"]);
        assert_eq!(b"x --b y".to_vec(), content);
        assert_eq!(
            RegionEnd::Boundary(BoundaryHit {
                depth: 0,
                close: true
            }),
            end,
        );
    }

    #[test]
    fn outer_boundary_ends_inner_region() {
        let (content, end) =
            collect_region(b"text\r\n--outer\r\n", &["outer", "inner"]);
        assert_eq!(b"text".to_vec(), content);
        assert_eq!(
            RegionEnd::Boundary(BoundaryHit {
                depth: 0,
                close: false
            }),
            end,
        );
    }

    #[test]
    fn unread_round_trips() {
        let (mut cursor, mut lb) = cursor_over(b"foo\r\nbar\r\n", &[]);
        let chunk = cursor.next_chunk(&mut lb).unwrap().unwrap();
        assert_eq!(b"foo".to_vec(), chunk);
        cursor.unread(chunk);
        assert_eq!(
            b"foo".to_vec(),
            cursor.next_chunk(&mut lb).unwrap().unwrap(),
        );
    }

    #[test]
    fn drain_discards_rest() {
        let (mut cursor, mut lb) =
            cursor_over(b"foo\r\nbar\r\n--b--\r\n", &["b"]);
        assert_eq!(
            RegionEnd::Boundary(BoundaryHit {
                depth: 0,
                close: true
            }),
            cursor.drain(&mut lb).unwrap(),
        );
    }

    #[test]
    fn unterminated_partial_line() {
        let (content, end) = collect_region(b"foo\r\nbar", &["b"]);
        assert_eq!(b"foo\r\nbar".to_vec(), content);
        assert_eq!(RegionEnd::Eof, end);
    }
}
