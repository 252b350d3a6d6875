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

//! Parsing for the `Content-*` header bodies the token stream itself needs
//! to understand.
//!
//! Everything here is tolerant: unparseable values yield `None` and the
//! caller falls back to a default, per RFC 2045's advice to muddle through.

use std::borrow::Cow;
use std::str;

use nom::*;

// RFC 5322 3.2.1 "quoted-pair", including the 8-bit clean "obsolete" syntax
named!(quoted_pair, preceded!(char!('\\'), take!(1)));

// RFC 5322 3.2.2 "Folding white space".
// Unfolding happens at a different layer; here the line-ending characters
// are treated as simple whitespace.
named!(fws, map!(is_a!(" \t\r\n"), |_| &b" "[..]));
// RFC 5322 3.2.2 "Comment text".
named!(ctext, is_not!("()\\ \t\r\n"));
// RFC 5322 3.2.2 "Comment content".
// The original definition includes FWS in the comment syntax instead of
// here, which makes it a lot more complicated.
named!(
    ccontent<()>,
    alt!(
        map!(ctext, |_| ())
            | map!(quoted_pair, |_| ())
            | map!(fws, |_| ())
            | comment
    )
);
// RFC 5322 3.2.2 "Comment". Note it is recursive.
named!(
    comment<()>,
    delimited!(char!('('), map!(many0_count!(ccontent), |_| ()), char!(')'))
);
// RFC 5322 3.2.2 "Comment or folding white space".
named!(
    cfws<()>,
    map!(many0_count!(alt!(map!(fws, |_| ()) | comment)), |_| ())
);

// RFC 5322 3.2.4 "Quoted [string] text", 8-bit clean.
named!(qtext, is_not!(" \t\r\n\\\""));
// RFC 5322 3.2.4 "Quoted [string] content".
// The original spec puts FWS in the quoted-string definition for some
// reason, which would make it much more complex.
named!(qcontent, alt!(qtext | quoted_pair | fws));
// RFC 5322 3.2.4 "Quoted string"
named!(
    quoted_string<Cow<[u8]>>,
    delimited!(
        pair!(opt!(cfws), char!('"')),
        fold_many0!(
            qcontent,
            Cow::Borrowed(&[] as &[u8]),
            |mut acc: Cow<[u8]>, item| {
                if acc.is_empty() {
                    acc = Cow::Borrowed(item);
                } else {
                    acc.to_mut().extend_from_slice(item);
                }
                acc
            }
        ),
        pair!(char!('"'), opt!(cfws))
    )
);

// RFC 2045 5.1 "token": printable US-ASCII less tspecials.
fn token_char(ch: u8) -> bool {
    ch > 32
        && ch < 127
        && !matches!(
            ch,
            b'(' | b')'
                | b'<'
                | b'>'
                | b'@'
                | b','
                | b';'
                | b':'
                | b'\\'
                | b'"'
                | b'/'
                | b'['
                | b']'
                | b'?'
                | b'='
        )
}
named!(token, take_while1!(token_char));

named!(
    parm_value<Cow<[u8]>>,
    alt!(quoted_string | map!(token, Cow::Borrowed))
);

// RFC 2045 5.1 "parameter"
named!(
    parameter<(Cow<[u8]>, Cow<[u8]>)>,
    separated_pair!(
        map!(token, Cow::Borrowed),
        tuple!(opt!(cfws), char!('='), opt!(cfws)),
        parm_value
    )
);

named!(
    content_type_value<ContentType>,
    map!(
        tuple!(
            opt!(cfws),
            token,
            opt!(cfws),
            char!('/'),
            opt!(cfws),
            token,
            opt!(cfws),
            many0!(preceded!(
                pair!(char!(';'), opt!(cfws)),
                terminated!(parameter, opt!(cfws))
            ))
        ),
        |(_, typ, _, _, _, subtype, _, parms)| ContentType {
            typ: Cow::Borrowed(typ),
            subtype: Cow::Borrowed(subtype),
            parms,
        }
    )
);

named!(
    cte_value,
    delimited!(opt!(cfws), token, opt!(cfws))
);

named!(
    content_length_value<u64>,
    map_opt!(
        delimited!(
            opt!(cfws),
            take_while1!(|ch| ch >= b'0' && ch <= b'9'),
            opt!(cfws)
        ),
        // Infallible UTF-8 since the input is all digits; the parse itself
        // can still overflow.
        |s| str::from_utf8(s).ok().and_then(|s| s.parse().ok())
    )
);

/// A parsed `Content-Type` header body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentType<'a> {
    pub typ: Cow<'a, [u8]>,
    pub subtype: Cow<'a, [u8]>,
    pub parms: Vec<(Cow<'a, [u8]>, Cow<'a, [u8]>)>,
}

impl<'a> ContentType<'a> {
    pub fn is_type(&self, typ: &str) -> bool {
        self.typ.eq_ignore_ascii_case(typ.as_bytes())
    }

    pub fn is_subtype(&self, subtype: &str) -> bool {
        self.subtype.eq_ignore_ascii_case(subtype.as_bytes())
    }

    /// Looks a parameter up by (case-insensitive) name, exactly as it
    /// appeared in the header.
    pub fn parm(&self, name: &str) -> Option<&[u8]> {
        self.parms
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name.as_bytes()))
            .map(|(_, v)| &**v)
    }

    /// Converts all borrowed fields to owned, detaching the value from the
    /// buffer it was parsed out of.
    pub fn into_owned(self) -> ContentType<'static> {
        ContentType {
            typ: Cow::Owned(self.typ.into_owned()),
            subtype: Cow::Owned(self.subtype.into_owned()),
            parms: self
                .parms
                .into_iter()
                .map(|(n, v)| {
                    (Cow::Owned(n.into_owned()), Cow::Owned(v.into_owned()))
                })
                .collect(),
        }
    }

    /// Looks a parameter up by name, reassembling RFC 2231 continuations
    /// (`name*0`, `name*1`, ...) and decoding the RFC 2231 extended syntax
    /// (`name*=charset'language'percent-encoded`) when present.
    pub fn parm_decoded(&self, name: &str) -> Option<Vec<u8>> {
        if let Some(v) = self.parm(name) {
            return Some(v.to_vec());
        }

        if let Some(v) = self.parm(&format!("{}*", name)) {
            return Some(decode_extended_value(v, true));
        }

        let mut out = Vec::new();
        let mut found = false;
        for section in 0.. {
            if let Some(v) = self.parm(&format!("{}*{}*", name, section)) {
                out.extend(decode_extended_value(v, 0 == section));
            } else if let Some(v) = self.parm(&format!("{}*{}", name, section))
            {
                out.extend_from_slice(v);
            } else {
                break;
            }
            found = true;
        }

        if found {
            Some(out)
        } else {
            None
        }
    }
}

/// Decodes an RFC 2231 extended parameter value.
///
/// The first section carries a `charset'language'` prefix which is stripped;
/// the character set itself is not applied here (charset conversion is the
/// caller's concern). All sections are percent-encoded.
fn decode_extended_value(value: &[u8], first_section: bool) -> Vec<u8> {
    let value = if first_section {
        let mut quotes = value.iter().enumerate().filter(|&(_, &b)| b'\'' == b);
        let _ = quotes.next();
        match quotes.next() {
            Some((ix, _)) => &value[ix + 1..],
            None => value,
        }
    } else {
        value
    };

    let mut out = Vec::with_capacity(value.len());
    let mut ix = 0;
    while ix < value.len() {
        let b = value[ix];
        if b'%' == b && ix + 2 < value.len() {
            let hex = &value[ix + 1..ix + 3];
            if let Some(decoded) = str::from_utf8(hex)
                .ok()
                .and_then(|h| u8::from_str_radix(h, 16).ok())
            {
                out.push(decoded);
                ix += 3;
                continue;
            }
        }
        out.push(b);
        ix += 1;
    }
    out
}

/// The transfer encodings the token stream understands.
///
/// Anything else degrades to `SevenBit` (identity) with a warning.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentTransferEncoding {
    SevenBit,
    EightBit,
    Binary,
    Base64,
    QuotedPrintable,
}

impl Default for ContentTransferEncoding {
    fn default() -> Self {
        ContentTransferEncoding::SevenBit
    }
}

impl ContentTransferEncoding {
    pub fn name(self) -> &'static str {
        match self {
            ContentTransferEncoding::SevenBit => "7bit",
            ContentTransferEncoding::EightBit => "8bit",
            ContentTransferEncoding::Binary => "binary",
            ContentTransferEncoding::Base64 => "base64",
            ContentTransferEncoding::QuotedPrintable => "quoted-printable",
        }
    }

    /// Whether this encoding is an identity transformation of the body.
    pub fn is_identity(self) -> bool {
        match self {
            ContentTransferEncoding::SevenBit
            | ContentTransferEncoding::EightBit
            | ContentTransferEncoding::Binary => true,
            _ => false,
        }
    }
}

/// Parses a `Content-Type` header body.
///
/// Returns `None` if no `type/subtype` head can be found. Anything
/// unparseable after the last well-formed parameter is ignored.
pub fn parse_content_type(value: &[u8]) -> Option<ContentType<'_>> {
    match content_type_value(value) {
        Ok((_, ct)) => Some(ct),
        // The grammar cannot tell whether a token ending flush against the
        // end of the value is finished; a line terminator settles it.
        Err(nom::Err::Incomplete(_)) => {
            match content_type_value(&terminated_copy(value)) {
                Ok((_, ct)) => Some(ct.into_owned()),
                Err(_) => None,
            }
        },
        Err(_) => None,
    }
}

/// Parses a `Content-Transfer-Encoding` header body down to its single
/// token, or `None` for anything unrecognised.
pub fn parse_content_transfer_encoding(
    value: &[u8],
) -> Option<ContentTransferEncoding> {
    match cte_value(value) {
        Ok((_, tok)) => cte_from_token(tok),
        Err(nom::Err::Incomplete(_)) => {
            match cte_value(&terminated_copy(value)) {
                Ok((_, tok)) => cte_from_token(tok),
                Err(_) => None,
            }
        },
        Err(_) => None,
    }
}

/// Parses a `Content-Length` header body.
pub fn parse_content_length(value: &[u8]) -> Option<u64> {
    match content_length_value(value) {
        Ok((_, len)) => Some(len),
        Err(nom::Err::Incomplete(_)) => {
            match content_length_value(&terminated_copy(value)) {
                Ok((_, len)) => Some(len),
                Err(_) => None,
            }
        },
        Err(_) => None,
    }
}

fn terminated_copy(value: &[u8]) -> Vec<u8> {
    let mut copy = Vec::with_capacity(value.len() + 1);
    copy.extend_from_slice(value);
    copy.push(b'\n');
    copy
}

fn cte_from_token(tok: &[u8]) -> Option<ContentTransferEncoding> {
    if tok.eq_ignore_ascii_case(b"7bit") {
        Some(ContentTransferEncoding::SevenBit)
    } else if tok.eq_ignore_ascii_case(b"8bit") {
        Some(ContentTransferEncoding::EightBit)
    } else if tok.eq_ignore_ascii_case(b"binary") {
        Some(ContentTransferEncoding::Binary)
    } else if tok.eq_ignore_ascii_case(b"base64") {
        Some(ContentTransferEncoding::Base64)
    } else if tok.eq_ignore_ascii_case(b"quoted-printable") {
        Some(ContentTransferEncoding::QuotedPrintable)
    } else {
        None
    }
}
