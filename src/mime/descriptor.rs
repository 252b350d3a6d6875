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

use log::warn;

use super::field::{Field, FieldParserRegistry, ParsedField};
use super::header::ContentTransferEncoding;
use crate::support::error::Warning;

/// What the headers seen so far say about the current entity's body.
///
/// A descriptor starts from its context's defaults (`text/plain` with
/// `us-ascii` and `7bit`, or `message/rfc822` for the children of a
/// `multipart/digest`) and is refined as each field is parsed. Malformed
/// fields leave the defaults in place; they never fail the stream.
#[derive(Clone, Debug)]
pub struct BodyDescriptor {
    mime_type: String,
    mime_subtype: String,
    boundary: Option<String>,
    charset: Option<String>,
    transfer_encoding: ContentTransferEncoding,
    content_length: Option<u64>,
    parent: Option<Box<BodyDescriptor>>,
    seen_content_type: bool,
}

impl Default for BodyDescriptor {
    fn default() -> Self {
        BodyDescriptor::text_plain()
    }
}

impl BodyDescriptor {
    pub fn text_plain() -> Self {
        BodyDescriptor {
            mime_type: "text".to_owned(),
            mime_subtype: "plain".to_owned(),
            boundary: None,
            charset: None,
            transfer_encoding: ContentTransferEncoding::default(),
            content_length: None,
            parent: None,
            seen_content_type: false,
        }
    }

    pub fn message_rfc822() -> Self {
        BodyDescriptor {
            mime_type: "message".to_owned(),
            mime_subtype: "rfc822".to_owned(),
            ..BodyDescriptor::text_plain()
        }
    }

    pub(super) fn with_parent(mut self, parent: &BodyDescriptor) -> Self {
        // Only one level of context is interesting; don't chain the whole
        // ancestry into every descriptor.
        let mut parent = parent.clone();
        parent.parent = None;
        self.parent = Some(Box::new(parent));
        self
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn mime_subtype(&self) -> &str {
        &self.mime_subtype
    }

    pub fn is_multipart(&self) -> bool {
        "multipart" == self.mime_type
    }

    pub fn is_message_rfc822(&self) -> bool {
        "message" == self.mime_type && "rfc822" == self.mime_subtype
    }

    pub fn is_digest(&self) -> bool {
        self.is_multipart() && "digest" == self.mime_subtype
    }

    /// The `boundary` parameter, if this is a multipart with one.
    pub fn boundary(&self) -> Option<&str> {
        self.boundary.as_deref()
    }

    /// The declared charset, defaulting to `us-ascii`.
    pub fn charset(&self) -> &str {
        self.charset.as_deref().unwrap_or("us-ascii")
    }

    pub fn transfer_encoding(&self) -> ContentTransferEncoding {
        self.transfer_encoding
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// The descriptor of the enclosing entity, where there is one.
    pub fn parent(&self) -> Option<&BodyDescriptor> {
        self.parent.as_deref()
    }

    /// Refines the descriptor from one parsed header field.
    pub(super) fn apply_field(
        &mut self,
        field: &Field,
        registry: &FieldParserRegistry,
    ) -> Option<Warning> {
        match registry.parse(field.name(), field.raw_body()) {
            ParsedField::ContentType(ct) => {
                // Extra Content-Type headers are ignored.
                if self.seen_content_type {
                    return None;
                }
                self.seen_content_type = true;

                self.mime_type = lowered(&ct.typ);
                self.mime_subtype = lowered(&ct.subtype);
                self.boundary = ct
                    .parm_decoded("boundary")
                    .and_then(|b| String::from_utf8(b).ok())
                    .filter(|b| !b.is_empty());
                self.charset = ct
                    .parm_decoded("charset")
                    .map(|c| lowered(&c))
                    .filter(|c| !c.is_empty());
                None
            },
            ParsedField::ContentTransferEncoding(Some(cte)) => {
                self.transfer_encoding = cte;
                None
            },
            ParsedField::ContentTransferEncoding(None) => {
                let value =
                    String::from_utf8_lossy(field.raw_body()).trim().to_owned();
                warn!(
                    "unknown Content-Transfer-Encoding {:?}, \
                     treating body as identity-encoded",
                    value,
                );
                Some(Warning::InvalidTransferEncoding(value))
            },
            ParsedField::ContentLength(len) => {
                self.content_length = len;
                None
            },
            ParsedField::Unstructured(_) => None,
        }
    }
}

fn lowered(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).to_ascii_lowercase()
}
