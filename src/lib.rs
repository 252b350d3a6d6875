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

//! Mimestream is a pull-based streaming tokenizer for RFC 5322 messages
//! with MIME (RFC 2045 through 2049) multipart and nested-message
//! structure.
//!
//! Feed it a `BufRead` and it hands back a flat sequence of tokens
//! describing the structure it walks through, with the raw or
//! transfer-decoded bytes of each body available as a sub-stream at the
//! right moments. Nothing is buffered beyond single lines; deeply nested
//! multiparts and embedded `message/rfc822` entities (even ones hidden
//! behind base64 or quoted-printable) are walked without ever holding a
//! whole body in memory.
//!
//! ```no_run
//! use std::io::Read;
//!
//! use mimestream::{MimeTokenStream, Token};
//!
//! # fn example(source: std::io::BufReader<std::fs::File>)
//! #     -> Result<(), mimestream::Error> {
//! let mut stream = MimeTokenStream::parse(source);
//! loop {
//!     match stream.next()? {
//!         Token::Field => {
//!             let field = stream.field().unwrap();
//!             println!("{}:{:?}", field.name(), field.raw_body());
//!         },
//!         Token::Body => {
//!             let mut text = Vec::new();
//!             if let Some(mut body) = stream.body_reader() {
//!                 body.read_to_end(&mut text)?;
//!             }
//!         },
//!         Token::EndOfStream => break,
//!         _ => (),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! This crate is the engine underneath higher layers (document models,
//! builders, transformations); it deliberately knows nothing about address
//! or date grammars, charset conversion, or storage.

pub mod mime;
pub mod support;

pub use crate::mime::descriptor::BodyDescriptor;
pub use crate::mime::field::{Field, FieldParserRegistry, ParsedField};
pub use crate::mime::header::{ContentTransferEncoding, ContentType};
pub use crate::mime::line::Position;
pub use crate::mime::stream::{
    BodyReader, MimeTokenStream, RecursionMode, StreamConfig, Token,
};
pub use crate::support::error::{Error, Warning};
