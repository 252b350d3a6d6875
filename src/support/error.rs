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

use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Line exceeds the maximum configured length")]
    LineTooLong,
    #[error("Entity nesting exceeds the maximum configured depth")]
    NestingTooDeep,
    #[error("Header line cannot be parsed")]
    MalformedHeader,
    #[error("Token stream already failed and is not resumable")]
    Unrecoverable,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A recoverable anomaly noticed while parsing.
///
/// Warnings never stop the token stream; they accumulate on it and can be
/// inspected after (or during) parsing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Warning {
    /// A header line could not be split into a valid name and body. The
    /// offending line is carried in lossy string form.
    MalformedHeader(String),
    /// A `Content-Transfer-Encoding` value was not recognised; the body is
    /// treated as identity-encoded.
    InvalidTransferEncoding(String),
    /// The input ended while multipart frames were still open. The frames
    /// are closed synthetically.
    UnexpectedEof,
    /// A nested multipart was terminated by an enclosing boundary rather
    /// than by its own close-delimiter.
    MissingCloseDelimiter,
}
