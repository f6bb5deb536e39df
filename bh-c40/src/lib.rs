// Copyright (C) 2020-2026  The Blockhouse Technology Limited (TBTL).
//
// This program is free software: you can redistribute it and/or modify it
// under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// This program is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public
// License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! This crate implements the C40 text compaction used by the headers of visible digital seals.
//!
//! Each group of two bytes, read as a big-endian `u16` value `v`, carries up to three characters
//! `c1`, `c2` and `c3` from the [`CHARSET`], where `v - 1 = 1600 * c1 + 40 * c2 + c3`.  The third
//! digit being zero means the group only carries two characters.
//!
//! The decoder is lenient: a trailing odd byte is ignored and digits pointing outside of the
//! [`CHARSET`] produce no character.
//!
//! # Examples
//!
//! ```
//! let encoded = bh_c40::encode("ES").unwrap();
//! assert_eq!(encoded, [0x75, 0x81]);
//!
//! assert_eq!(bh_c40::decode(&encoded), "ES");
//! ```

use bherror::Error;

/// The characters addressable by a C40 digit.
///
/// Indices `0` to `2` are shift placeholders and all render as `*`.
pub const CHARSET: &[u8; 40] = b"*** 0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Groups whose value minus one reaches this threshold are not base-40 triples.
const SPECIAL_GROUP_THRESHOLD: u32 = 0xFE00;

/// Error type returned by [`encode`].
#[derive(strum_macros::Display, Debug, PartialEq, Clone)]
pub enum C40Error {
    /// The character has no C40 digit.
    #[strum(to_string = "Character {0:?} is not in the C40 character set")]
    UnsupportedCharacter(char),
    /// The text length leaves a single character in the last group, which the decoder cannot
    /// represent.
    #[strum(to_string = "Text of length {0} cannot be C40 encoded")]
    UnencodableLength(usize),
}

impl bherror::BhError for C40Error {}

/// Result type alias for the crate.
pub type Result<T> = bherror::Result<T, C40Error>;

/// Decodes C40 compacted `bytes` into text.
///
/// The input is processed in consecutive 2-byte groups; a trailing odd byte is ignored.
pub fn decode(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len() / 2 * 3);

    for group in bytes.chunks_exact(2) {
        let short_value = u32::from(u16::from_be_bytes([group[0], group[1]]));

        // A zero group has no valid digit at all.
        let Some(value) = short_value.checked_sub(1) else {
            continue;
        };

        if value >= SPECIAL_GROUP_THRESHOLD {
            push_digit(&mut text, short_value);
            continue;
        }

        push_digit(&mut text, value / 1600);
        push_digit(&mut text, (value % 1600) / 40);

        let third = value % 40;
        if third > 0 {
            push_digit(&mut text, third);
        }
    }

    text
}

/// Decodes `length` C40 compacted bytes of `buffer` starting at `offset`.
///
/// Returns [`None`] if the range does not fit into the `buffer`.
pub fn decode_at(buffer: &[u8], offset: usize, length: usize) -> Option<String> {
    let end = offset.checked_add(length)?;
    buffer.get(offset..end).map(decode)
}

/// Encodes the `text` into C40 compacted bytes.
///
/// The `*` character is encoded as the digit `0`, hence a `*` in the third position of a group
/// does not survive decoding.
///
/// # Errors
///
/// An error is returned if the `text` contains a character outside of the [`CHARSET`], or if its
/// length would leave a lone character in the last group.
pub fn encode(text: &str) -> Result<Vec<u8>> {
    let digits = text.chars().map(digit).collect::<Result<Vec<_>>>()?;

    if digits.len() % 3 == 1 {
        return Err(Error::root(C40Error::UnencodableLength(digits.len())));
    }

    let mut bytes = Vec::with_capacity(digits.len().div_ceil(3) * 2);

    for triple in digits.chunks(3) {
        let third = triple.get(2).copied().unwrap_or(0);
        let value = 1600 * triple[0] + 40 * triple[1] + third + 1;
        bytes.extend_from_slice(&value.to_be_bytes());
    }

    Ok(bytes)
}

fn push_digit(text: &mut String, digit: u32) {
    if let Some(&c) = usize::try_from(digit).ok().and_then(|i| CHARSET.get(i)) {
        text.push(char::from(c));
    }
}

fn digit(c: char) -> Result<u16> {
    if c == '*' {
        return Ok(0);
    }

    CHARSET
        .iter()
        .skip(3)
        .position(|&candidate| char::from(candidate) == c)
        .map(|position| (position + 3) as u16)
        .ok_or_else(|| Error::root(C40Error::UnsupportedCharacter(c)))
}
