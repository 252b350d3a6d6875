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

//! The pull parser which descends through a MIME message, one token at a
//! time.
//!
//! It is designed to be robust moreso than strictly correct. That is, it
//! will accept wildly malformed data but will still do its best to carry on,
//! even in the face of things that are invalid per the standard. It is also
//! very conservative as to what quantity of data it will load into memory:
//! bodies are only ever streamed, and everything buffered is bounded by the
//! configured line and field caps.

use std::fmt;
use std::io::{self, BufRead, Read};
use std::mem;

use log::warn;

use super::boundary::{
    classify_boundary, delimiter_for, RegionCursor, RegionEnd,
};
use super::descriptor::BodyDescriptor;
use super::encoding::TransferDecoder;
use super::field::{split_field, Field, FieldParserRegistry};
use super::input::InputStack;
use super::line::{split_ending, LineSource, Position};
use crate::support::error::{Error, Warning};

/// One step of the token stream.
///
/// `Start*` and `End*` tokens always pair up in nesting order; `EndOfStream`
/// is terminal. Companion data (the current field, body descriptor, body
/// bytes) is exposed through accessors on the stream rather than carried in
/// the token itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Token {
    StartHeader,
    Field,
    EndHeader,
    StartMultipart,
    Preamble,
    StartBodypart,
    Body,
    EndBodypart,
    Epilogue,
    EndMultipart,
    StartMessage,
    EndMessage,
    EndOfStream,
    RawEntity,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match *self {
            Token::StartHeader => "StartHeader",
            Token::Field => "Field",
            Token::EndHeader => "EndHeader",
            Token::StartMultipart => "StartMultipart",
            Token::Preamble => "Preamble",
            Token::StartBodypart => "StartBodypart",
            Token::Body => "Body",
            Token::EndBodypart => "EndBodypart",
            Token::Epilogue => "Epilogue",
            Token::EndMultipart => "EndMultipart",
            Token::StartMessage => "StartMessage",
            Token::EndMessage => "EndMessage",
            Token::EndOfStream => "EndOfStream",
            Token::RawEntity => "RawEntity",
        };
        write!(f, "{}", name)
    }
}

/// How to treat the next entity encountered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecursionMode {
    /// Descend into `message/rfc822` bodies (the default).
    Recurse,
    /// Treat `message/rfc822` bodies as opaque leaf bodies.
    NoRecurse,
    /// Emit each entity as a single `RawEntity` token whose stream yields
    /// the entity verbatim, headers included.
    Raw,
}

#[derive(Clone)]
pub struct StreamConfig {
    /// Longest acceptable logical line; exceeding it is fatal.
    pub max_line_length: usize,
    /// Cap on one logical (folded) field; further folding is cut off.
    pub max_field_length: usize,
    /// Cap on the entity frame stack; exceeding it is fatal.
    pub max_nesting_depth: usize,
    /// Fail with `MalformedHeader` instead of tolerating bad header lines.
    pub strict_headers: bool,
    /// Accept a bare LF as the blank line ending a header block.
    pub accept_lf_endings: bool,
    /// Per-field-name parsers used to build body descriptors.
    pub registry: FieldParserRegistry,
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            max_line_length: 1024 * 1024,
            max_field_length: 64 * 1024,
            max_nesting_depth: 100,
            strict_headers: false,
            accept_lf_endings: true,
            registry: FieldParserRegistry::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FrameKind {
    Message,
    Multipart,
    Bodypart,
}

#[derive(Debug)]
struct EntityFrame {
    kind: FrameKind,
    descriptor: BodyDescriptor,
    /// Multipart frames only: the `--`-prefixed delimiter.
    boundary: Option<Vec<u8>>,
    /// Which input layer this frame reads from.
    layer: usize,
    /// Multipart frames only: children default to `message/rfc822`.
    digest: bool,
}

enum State {
    Initial,
    InitialHeadless(BodyDescriptor),
    Current(Token),
    Done,
    Failed,
}

/// What a `RawEntity` token stood in for, which determines how to continue
/// once its stream is exhausted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RawFollow {
    /// A bodypart introduced by a delimiter.
    Part,
    /// The body of an entity (a `message/rfc822` payload).
    EntityBody,
    /// The whole input.
    Whole,
}

/// A pull parser for RFC 5322 / MIME entities.
///
/// `next()` advances exactly one token. While the current token is `Body`,
/// `Preamble`, `Epilogue`, or `RawEntity`, `body_reader()` yields the
/// content as a byte stream, transfer-decoded for `Body`; an undrained body
/// is silently discarded by the next `next()` call.
pub struct MimeTokenStream<R> {
    input: InputStack<R>,
    config: StreamConfig,
    frames: Vec<EntityFrame>,
    state: State,
    field: Option<Field>,
    cursor: Option<RegionCursor>,
    decoder: Option<TransferDecoder>,
    out_buf: Vec<u8>,
    out_off: usize,
    region_done: bool,
    ending: Option<RegionEnd>,
    raw_follow: Option<RawFollow>,
    recursion_mode: RecursionMode,
    warnings: Vec<Warning>,
    truncated: bool,
    default_descriptor: BodyDescriptor,
}

impl<R: BufRead> MimeTokenStream<R> {
    /// Starts parsing at the top of a message header block.
    pub fn parse(source: R) -> Self {
        Self::parse_with_config(source, StreamConfig::default())
    }

    pub fn parse_with_config(source: R, config: StreamConfig) -> Self {
        Self::new(source, config, State::Initial)
    }

    /// Starts parsing input which has no outer header block; `content_type`
    /// seeds the initial body descriptor as if a header had declared it.
    ///
    /// The first token emitted is whatever would follow the (implicit)
    /// `EndHeader`; in particular, the initial `StartMultipart` of a
    /// multipart content type is suppressed.
    pub fn parse_headless(source: R, content_type: &str) -> Self {
        Self::parse_headless_with_config(
            source,
            content_type,
            StreamConfig::default(),
        )
    }

    pub fn parse_headless_with_config(
        source: R,
        content_type: &str,
        config: StreamConfig,
    ) -> Self {
        let mut descriptor = BodyDescriptor::default();
        let field = Field::new(
            "Content-Type".to_owned(),
            content_type.as_bytes().to_vec(),
            Vec::new(),
        );
        let warning = descriptor.apply_field(&field, &config.registry);

        let mut this =
            Self::new(source, config, State::InitialHeadless(descriptor));
        if let Some(warning) = warning {
            this.warnings.push(warning);
        }
        if super::header::parse_content_type(content_type.as_bytes()).is_none()
        {
            warn!("unparseable forced content type: {:?}", content_type);
            this.warnings
                .push(Warning::MalformedHeader(content_type.to_owned()));
        }
        this
    }

    fn new(source: R, config: StreamConfig, state: State) -> Self {
        MimeTokenStream {
            input: InputStack::new(source, config.max_line_length),
            config,
            frames: Vec::new(),
            state,
            field: None,
            cursor: None,
            decoder: None,
            out_buf: Vec::new(),
            out_off: 0,
            region_done: false,
            ending: None,
            raw_follow: None,
            recursion_mode: RecursionMode::Recurse,
            warnings: Vec::new(),
            truncated: false,
            default_descriptor: BodyDescriptor::default(),
        }
    }

    /// Advances the stream by exactly one token and returns it.
    ///
    /// After `EndOfStream`, further calls keep returning `EndOfStream`.
    /// After an error, further calls fail with `Unrecoverable`.
    pub fn next(&mut self) -> Result<Token, Error> {
        let state = mem::replace(&mut self.state, State::Failed);
        let token = match state {
            State::Initial => self.start()?,
            State::InitialHeadless(descriptor) => {
                self.start_headless(descriptor)?
            },
            State::Current(token) => self.advance_from(token)?,
            State::Done => Token::EndOfStream,
            State::Failed => return Err(Error::Unrecoverable),
        };

        self.state = if Token::EndOfStream == token {
            State::Done
        } else {
            State::Current(token)
        };
        Ok(token)
    }

    /// The descriptor of the innermost open entity.
    pub fn body_descriptor(&self) -> &BodyDescriptor {
        self.frames
            .last()
            .map(|frame| &frame.descriptor)
            .unwrap_or(&self.default_descriptor)
    }

    /// The current field; present exactly while the current token is
    /// `Field`.
    pub fn field(&self) -> Option<&Field> {
        self.field.as_ref()
    }

    /// A reader over the current content region, valid while the current
    /// token is `Body` (transfer-decoded), `Preamble`, `Epilogue`, or
    /// `RawEntity` (verbatim).
    ///
    /// The reader borrows the stream, so it must be dropped before the next
    /// `next()` call; whatever it did not consume is discarded then.
    pub fn body_reader(&mut self) -> Option<BodyReader<'_, R>> {
        match self.state {
            State::Current(Token::Body)
            | State::Current(Token::Preamble)
            | State::Current(Token::Epilogue)
            | State::Current(Token::RawEntity) => {
                Some(BodyReader { stream: self })
            },
            _ => None,
        }
    }

    /// Applies to the next entity encountered.
    pub fn set_recursion_mode(&mut self, mode: RecursionMode) {
        self.recursion_mode = mode;
    }

    pub fn recursion_mode(&self) -> RecursionMode {
        self.recursion_mode
    }

    /// Recoverable anomalies encountered so far.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Whether the input ended while multipart frames were still open.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// The position of the next unconsumed byte of the raw input.
    pub fn position(&self) -> Position {
        self.input.position()
    }

    fn start(&mut self) -> Result<Token, Error> {
        if RecursionMode::Raw == self.recursion_mode {
            self.begin_region(
                RegionCursor::new(Vec::new()),
                TransferDecoder::identity(),
            );
            self.raw_follow = Some(RawFollow::Whole);
            return Ok(Token::RawEntity);
        }

        self.push_frame(
            FrameKind::Message,
            BodyDescriptor::default(),
            None,
            false,
        )?;
        Ok(Token::StartHeader)
    }

    fn start_headless(
        &mut self,
        descriptor: BodyDescriptor,
    ) -> Result<Token, Error> {
        self.push_frame(FrameKind::Message, descriptor, None, false)?;
        match self.after_end_header()? {
            // The initial StartMultipart is suppressed by convention.
            Token::StartMultipart => self.after_start_multipart(),
            token => Ok(token),
        }
    }

    fn advance_from(&mut self, token: Token) -> Result<Token, Error> {
        match token {
            Token::StartHeader | Token::Field => self.next_field_token(),
            Token::EndHeader => self.after_end_header(),
            Token::StartMessage | Token::StartBodypart => {
                Ok(Token::StartHeader)
            },
            Token::StartMultipart => self.after_start_multipart(),
            Token::Preamble => {
                let end = self.finish_region()?;
                self.continue_in_multipart(end)
            },
            Token::Body => {
                let end = self.finish_region()?;
                self.ending = Some(end);
                self.close_entity_frame()
            },
            Token::RawEntity => {
                let end = self.finish_region()?;
                match self.raw_follow.take() {
                    Some(RawFollow::Part) => self.continue_in_multipart(end),
                    Some(RawFollow::EntityBody) => {
                        self.ending = Some(end);
                        self.close_entity_frame()
                    },
                    Some(RawFollow::Whole) | None => Ok(Token::EndOfStream),
                }
            },
            Token::EndBodypart => {
                let end = self.take_ending();
                self.continue_in_multipart(end)
            },
            Token::Epilogue => {
                let end = self.finish_region()?;
                self.ending = Some(end);
                self.close_multipart()
            },
            Token::EndMultipart => self.close_entity_frame(),
            Token::EndMessage => {
                if self.frames.is_empty() {
                    Ok(Token::EndOfStream)
                } else {
                    self.close_entity_frame()
                }
            },
            Token::EndOfStream => Ok(Token::EndOfStream),
        }
    }

    /// Reads the next logical field, or ends the header block.
    fn next_field_token(&mut self) -> Result<Token, Error> {
        match self.read_logical_field()? {
            Some(field) => {
                let registry = &self.config.registry;
                let warning = match self.frames.last_mut() {
                    Some(frame) => {
                        frame.descriptor.apply_field(&field, registry)
                    },
                    None => None,
                };
                if let Some(warning) = warning {
                    self.warnings.push(warning);
                }
                self.field = Some(field);
                Ok(Token::Field)
            },
            None => {
                self.field = None;
                Ok(Token::EndHeader)
            },
        }
    }

    fn read_logical_field(&mut self) -> Result<Option<Field>, Error> {
        let boundaries = self.active_boundaries();
        let accept_lf = self.config.accept_lf_endings;
        let max_field = self.config.max_field_length;

        enum FirstLine {
            Terminator,
            ConsumedTerminator,
            Line,
        }

        let mut view = self.input.view();
        let verdict = match view.peek_line()? {
            None => FirstLine::Terminator,
            Some(line) => {
                if is_blank(line, accept_lf) {
                    FirstLine::ConsumedTerminator
                } else if !boundaries.is_empty()
                    && classify_boundary(line, &boundaries).is_some()
                {
                    // A boundary with no blank line before it still ends
                    // the header block; the body is then empty.
                    FirstLine::Terminator
                } else {
                    FirstLine::Line
                }
            },
        };

        match verdict {
            FirstLine::Terminator => return Ok(None),
            FirstLine::ConsumedTerminator => {
                view.read_line()?;
                return Ok(None);
            },
            FirstLine::Line => (),
        }

        let mut source = view.read_line()?.unwrap_or_default();
        while source.len() <= max_field {
            let folded = match view.peek_line()? {
                Some(line) => {
                    (line.starts_with(b" ") || line.starts_with(b"\t"))
                        && !is_blank(line, accept_lf)
                },
                None => false,
            };
            if !folded {
                break;
            }
            if let Some(line) = view.read_line()? {
                source.extend_from_slice(&line);
            }
        }

        let (logical, _) = split_ending(&source);
        match split_field(logical) {
            Some((name, body)) => {
                let name = name.to_owned();
                let body = body.to_vec();
                Ok(Some(Field::new(name, body, source)))
            },
            None => {
                if self.config.strict_headers {
                    return Err(Error::MalformedHeader);
                }
                let body = logical.to_vec();
                let lossy = String::from_utf8_lossy(&body).into_owned();
                warn!("tolerating malformed header line: {:?}", lossy);
                self.warnings.push(Warning::MalformedHeader(lossy));
                Ok(Some(Field::new(String::new(), body, source)))
            },
        }
    }

    /// Decides what the entity whose headers just ended contains.
    fn after_end_header(&mut self) -> Result<Token, Error> {
        let descriptor = match self.frames.last() {
            Some(frame) => frame.descriptor.clone(),
            None => return Ok(Token::EndOfStream),
        };

        if descriptor.is_multipart() {
            if let Some(boundary) = descriptor.boundary() {
                let delimiter = delimiter_for(boundary);
                let digest = descriptor.is_digest();
                self.push_frame(
                    FrameKind::Multipart,
                    descriptor,
                    Some(delimiter),
                    digest,
                )?;
                return Ok(Token::StartMultipart);
            }
            // A multipart with no boundary parameter cannot be split into
            // parts; its body is opaque.
            warn!(
                "multipart/{} without a boundary parameter",
                descriptor.mime_subtype(),
            );
        } else if descriptor.is_message_rfc822() {
            match self.recursion_mode {
                RecursionMode::Recurse => {
                    if self.frames.len() >= self.config.max_nesting_depth {
                        return Err(Error::NestingTooDeep);
                    }
                    let boundaries = self.active_boundaries();
                    self.input.push_layer(
                        RegionCursor::new(boundaries),
                        TransferDecoder::for_encoding(
                            descriptor.transfer_encoding(),
                        ),
                    );
                    let inner =
                        BodyDescriptor::default().with_parent(&descriptor);
                    self.push_frame(FrameKind::Message, inner, None, false)?;
                    return Ok(Token::StartMessage);
                },
                RecursionMode::Raw => {
                    let boundaries = self.active_boundaries();
                    self.begin_region(
                        RegionCursor::new(boundaries),
                        TransferDecoder::identity(),
                    );
                    self.raw_follow = Some(RawFollow::EntityBody);
                    return Ok(Token::RawEntity);
                },
                RecursionMode::NoRecurse => (),
            }
        }

        let boundaries = self.active_boundaries();
        self.begin_region(
            RegionCursor::new(boundaries),
            TransferDecoder::for_encoding(descriptor.transfer_encoding()),
        );
        Ok(Token::Body)
    }

    /// Looks for a preamble ahead of the first delimiter.
    fn after_start_multipart(&mut self) -> Result<Token, Error> {
        let mut cursor = RegionCursor::new(self.active_boundaries());
        let first = {
            let mut view = self.input.view();
            cursor.next_chunk(&mut view)?
        };

        match first {
            Some(chunk) => {
                cursor.unread(chunk);
                self.begin_region(cursor, TransferDecoder::identity());
                Ok(Token::Preamble)
            },
            None => {
                let end = cursor.end().unwrap_or(RegionEnd::Eof);
                self.continue_in_multipart(end)
            },
        }
    }

    /// Continues within the innermost multipart after a region or part
    /// ended with `end`.
    fn continue_in_multipart(
        &mut self,
        end: RegionEnd,
    ) -> Result<Token, Error> {
        match end {
            RegionEnd::Boundary(hit)
                if hit.depth == self.innermost_multipart_depth() =>
            {
                if hit.close {
                    self.begin_epilogue()
                } else {
                    self.start_bodypart()
                }
            },
            RegionEnd::Boundary(_) => {
                // An enclosing boundary arrived before this multipart's
                // close-delimiter; close it implicitly and let the ending
                // propagate outwards.
                warn!("multipart closed by an enclosing boundary");
                self.warnings.push(Warning::MissingCloseDelimiter);
                self.ending = Some(end);
                self.close_multipart()
            },
            RegionEnd::Eof => {
                self.note_truncation();
                self.ending = Some(RegionEnd::Eof);
                self.close_multipart()
            },
        }
    }

    fn start_bodypart(&mut self) -> Result<Token, Error> {
        if RecursionMode::Raw == self.recursion_mode {
            self.begin_region(
                RegionCursor::new(self.active_boundaries()),
                TransferDecoder::identity(),
            );
            self.raw_follow = Some(RawFollow::Part);
            return Ok(Token::RawEntity);
        }

        let parent = self
            .frames
            .iter()
            .rev()
            .find(|frame| FrameKind::Multipart == frame.kind);
        let descriptor = match parent {
            Some(parent) if parent.digest => {
                BodyDescriptor::message_rfc822()
                    .with_parent(&parent.descriptor)
            },
            Some(parent) => {
                BodyDescriptor::default().with_parent(&parent.descriptor)
            },
            None => BodyDescriptor::default(),
        };

        self.push_frame(FrameKind::Bodypart, descriptor, None, false)?;
        Ok(Token::StartBodypart)
    }

    /// Looks for an epilogue after a close-delimiter.
    fn begin_epilogue(&mut self) -> Result<Token, Error> {
        // The multipart's own delimiter stops mattering after its
        // close-delimiter; the epilogue runs to the enclosing boundary.
        let mut boundaries = self.active_boundaries();
        boundaries.pop();

        let mut cursor = RegionCursor::new(boundaries);
        let first = {
            let mut view = self.input.view();
            cursor.next_chunk(&mut view)?
        };

        match first {
            Some(chunk) => {
                cursor.unread(chunk);
                self.begin_region(cursor, TransferDecoder::identity());
                Ok(Token::Epilogue)
            },
            None => {
                self.ending =
                    Some(cursor.end().unwrap_or(RegionEnd::Eof));
                self.close_multipart()
            },
        }
    }

    /// Pops the innermost multipart frame.
    fn close_multipart(&mut self) -> Result<Token, Error> {
        let frame = self.frames.pop();
        debug_assert!(
            frame.map(|f| FrameKind::Multipart == f.kind).unwrap_or(false)
        );
        Ok(Token::EndMultipart)
    }

    /// Pops the innermost entity frame and emits its end token. For a
    /// message read through a decode layer, the layer is popped too, and
    /// the pending ending becomes that of the enclosing region.
    fn close_entity_frame(&mut self) -> Result<Token, Error> {
        match self.frames.pop() {
            Some(frame) => match frame.kind {
                FrameKind::Bodypart => Ok(Token::EndBodypart),
                FrameKind::Multipart => Ok(Token::EndMultipart),
                FrameKind::Message => {
                    if frame.layer > 0 && frame.layer == self.input.top() {
                        let end = self.input.pop_layer()?;
                        self.ending = Some(end);
                    }
                    Ok(Token::EndMessage)
                },
            },
            None => Ok(Token::EndOfStream),
        }
    }

    fn push_frame(
        &mut self,
        kind: FrameKind,
        descriptor: BodyDescriptor,
        boundary: Option<Vec<u8>>,
        digest: bool,
    ) -> Result<(), Error> {
        if self.frames.len() >= self.config.max_nesting_depth {
            return Err(Error::NestingTooDeep);
        }
        self.frames.push(EntityFrame {
            kind,
            descriptor,
            boundary,
            layer: self.input.top(),
            digest,
        });
        Ok(())
    }

    /// The boundaries of the multipart frames at the current input layer,
    /// outermost first.
    fn active_boundaries(&self) -> Vec<Vec<u8>> {
        let top = self.input.top();
        self.frames
            .iter()
            .filter(|frame| {
                FrameKind::Multipart == frame.kind && frame.layer == top
            })
            .filter_map(|frame| frame.boundary.clone())
            .collect()
    }

    fn innermost_multipart_depth(&self) -> usize {
        let top = self.input.top();
        self.frames
            .iter()
            .filter(|frame| {
                FrameKind::Multipart == frame.kind && frame.layer == top
            })
            .count()
            .saturating_sub(1)
    }

    fn begin_region(
        &mut self,
        cursor: RegionCursor,
        decoder: TransferDecoder,
    ) {
        self.cursor = Some(cursor);
        self.decoder = Some(decoder);
        self.out_buf.clear();
        self.out_off = 0;
        self.region_done = false;
    }

    /// Consumes whatever remains of the active region and tears it down.
    fn finish_region(&mut self) -> Result<RegionEnd, Error> {
        let end = match self.cursor.as_mut() {
            Some(cursor) => {
                let mut view = self.input.view();
                cursor.drain(&mut view)?
            },
            None => self.take_ending(),
        };
        self.cursor = None;
        self.decoder = None;
        self.out_buf.clear();
        self.out_off = 0;
        self.region_done = false;
        Ok(end)
    }

    fn take_ending(&mut self) -> RegionEnd {
        self.ending.take().unwrap_or(RegionEnd::Eof)
    }

    fn note_truncation(&mut self) {
        if !self.truncated {
            self.truncated = true;
            warn!("input ended inside an open multipart; closing synthetically");
            self.warnings.push(Warning::UnexpectedEof);
        }
    }

    fn read_body(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.out_off < self.out_buf.len() {
                let len = dst.len().min(self.out_buf.len() - self.out_off);
                dst[..len].copy_from_slice(
                    &self.out_buf[self.out_off..self.out_off + len],
                );
                self.out_off += len;
                return Ok(len);
            }

            if self.region_done || dst.is_empty() {
                return Ok(0);
            }

            self.out_buf.clear();
            self.out_off = 0;

            let chunk = match self.cursor.as_mut() {
                Some(cursor) => {
                    let mut view = self.input.view();
                    cursor.next_chunk(&mut view).map_err(into_io)?
                },
                None => None,
            };

            match chunk {
                Some(chunk) => {
                    if let Some(decoder) = self.decoder.as_mut() {
                        decoder.push(&chunk, &mut self.out_buf);
                    }
                },
                None => {
                    if let Some(decoder) = self.decoder.as_mut() {
                        decoder.finish(&mut self.out_buf);
                    }
                    self.region_done = true;
                },
            }
        }
    }
}

fn is_blank(line: &[u8], accept_lf: bool) -> bool {
    b"\r\n" == line || (accept_lf && b"\n" == line)
}

fn into_io(e: Error) -> io::Error {
    match e {
        Error::Io(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}

/// The body view handed out by `MimeTokenStream::body_reader()`.
///
/// Reading past the end of the region yields EOF without advancing the
/// token stream.
pub struct BodyReader<'a, R> {
    stream: &'a mut MimeTokenStream<R>,
}

impl<'a, R: BufRead> Read for BodyReader<'a, R> {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        self.stream.read_body(dst)
    }
}
