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

//! Logical header fields and the pluggable per-name parser registry.

use std::collections::HashMap;
use std::str;

use lazy_static::lazy_static;

use super::header::{
    parse_content_length, parse_content_transfer_encoding, parse_content_type,
    ContentTransferEncoding, ContentType,
};

/// One logical header field: possibly several source lines folded together.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    name: String,
    raw_body: Vec<u8>,
    source: Vec<u8>,
}

impl Field {
    pub(super) fn new(name: String, raw_body: Vec<u8>, source: Vec<u8>) -> Self {
        Field {
            name,
            raw_body,
            source,
        }
    }

    /// The field name, with surrounding whitespace trimmed.
    ///
    /// Empty for lines which could not be split into a valid name and body
    /// (tolerated as raw fields by default).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// The field body as it appeared on the wire: folding whitespace and any
    /// single leading space are preserved; the final line ending is not part
    /// of the body.
    pub fn raw_body(&self) -> &[u8] {
        &self.raw_body
    }

    /// The raw source of the field, line endings included.
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// The field body with folding undone: line endings removed, the
    /// whitespace that started each continuation line retained.
    pub fn unfolded_body(&self) -> Vec<u8> {
        self.raw_body
            .iter()
            .copied()
            .filter(|&b| b'\r' != b && b'\n' != b)
            .collect()
    }
}

/// A field body parsed by whichever parser its name selects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParsedField<'a> {
    ContentType(ContentType<'a>),
    ContentTransferEncoding(Option<ContentTransferEncoding>),
    ContentLength(Option<u64>),
    /// Any field without a registered parser, or a registered field whose
    /// body failed to parse where the parser has no better answer.
    Unstructured(&'a [u8]),
}

pub type FieldParserFn = for<'a> fn(&'a [u8]) -> Option<ParsedField<'a>>;

/// Maps lowercased field names to parse functions.
///
/// Unregistered names (and registered parsers returning `None`) fall back to
/// the unstructured parser, which passes the body through untouched.
#[derive(Clone)]
pub struct FieldParserRegistry {
    parsers: HashMap<String, FieldParserFn>,
}

impl FieldParserRegistry {
    pub fn empty() -> Self {
        FieldParserRegistry {
            parsers: HashMap::new(),
        }
    }

    /// The registry covering the fields the token stream itself interprets.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register("content-type", parse_content_type_field);
        registry
            .register("content-transfer-encoding", parse_cte_field);
        registry.register("content-length", parse_content_length_field);
        registry
    }

    pub fn register(&mut self, name: &str, parser: FieldParserFn) {
        self.parsers.insert(name.to_ascii_lowercase(), parser);
    }

    pub fn parse<'a>(&self, name: &str, body: &'a [u8]) -> ParsedField<'a> {
        self.parsers
            .get(&name.to_ascii_lowercase())
            .and_then(|parser| parser(body))
            .unwrap_or(ParsedField::Unstructured(body))
    }
}

impl Default for FieldParserRegistry {
    fn default() -> Self {
        DEFAULT_REGISTRY.clone()
    }
}

lazy_static! {
    static ref DEFAULT_REGISTRY: FieldParserRegistry =
        FieldParserRegistry::standard();
}

fn parse_content_type_field(body: &[u8]) -> Option<ParsedField<'_>> {
    parse_content_type(body).map(ParsedField::ContentType)
}

fn parse_cte_field(body: &[u8]) -> Option<ParsedField<'_>> {
    Some(ParsedField::ContentTransferEncoding(
        parse_content_transfer_encoding(body),
    ))
}

fn parse_content_length_field(body: &[u8]) -> Option<ParsedField<'_>> {
    Some(ParsedField::ContentLength(parse_content_length(body)))
}

/// Splits one logical field into its trimmed name and raw body.
///
/// Returns `None` for lines with no colon or whose name contains anything
/// outside printable ASCII.
pub(super) fn split_field(field: &[u8]) -> Option<(&str, &[u8])> {
    let colon = field.iter().position(|&b| b':' == b)?;
    let (name, body) = (&field[..colon], &field[colon + 1..]);

    let name = str::from_utf8(name).ok()?.trim();
    if name.is_empty()
        || !name.bytes().all(|b| b > 32 && b < 127 && b':' != b)
    {
        return None;
    }

    Some((name, body))
}
