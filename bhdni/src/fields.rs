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

//! This module extracts the tag/length/value field table following the header.
//!
//! Each field is a one byte tag, a length and the value.  The length is a single byte, unless it
//! is `0x81` (the length is the next byte) or `0x82` (the length is the next two bytes, big
//! endian).  The field tagged [`SIGNATURE_TAG`] holds the signature over every byte preceding it
//! and ends the table.

use std::collections::BTreeMap;

use crate::{DniError, Result};

/// Tag of the field holding the signature.  It is never stored in a [`FieldTable`].
pub const SIGNATURE_TAG: u8 = 0xFF;

const LENGTH_IN_NEXT_BYTE: u8 = 0x81;
const LENGTH_IN_NEXT_TWO_BYTES: u8 = 0x82;

/// The tags of the fields this crate knows how to interpret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum FieldTag {
    /// Number of the identity document.
    DocumentNumber = 0x40,
    /// Birth date, `dd-mm-yyyy`.
    BirthDate = 0x42,
    /// Given name.
    GivenName = 0x44,
    /// Surnames.
    Surnames = 0x46,
    /// Sex.
    Sex = 0x48,
    /// Expiry date of the identity document, `dd-mm-yyyy`.
    ExpiryDate = 0x4C,
    /// Portrait, JPEG 2000.
    Photo = 0x50,
    /// Address.
    Address = 0x60,
    /// First part of the birthplace.
    Birthplace1 = 0x62,
    /// Nationality.
    Nationality = 0x64,
    /// Names of the parents.
    Parentage = 0x66,
    /// Number of the physical support of the document.
    SupportNumber = 0x68,
    /// Big-endian unsigned integer, `1` if the holder is of legal age.
    LegalAge = 0x70,
    /// First part of the place of residence.
    ResidencePlace1 = 0x72,
    /// Second part of the place of residence.
    ResidencePlace2 = 0x74,
    /// Third part of the place of residence.
    ResidencePlace3 = 0x76,
    /// Second part of the birthplace.
    Birthplace2 = 0x78,
    /// Third part of the birthplace.
    Birthplace3 = 0x7A,
    /// Expiry of the QR code itself, `dd-mm-yyyy hh:mm:ss`.
    QrExpiry = 0x80,
}

impl FieldTag {
    /// Every known tag.
    pub const ALL: [FieldTag; 19] = [
        Self::DocumentNumber,
        Self::BirthDate,
        Self::GivenName,
        Self::Surnames,
        Self::Sex,
        Self::ExpiryDate,
        Self::Photo,
        Self::Address,
        Self::Birthplace1,
        Self::Nationality,
        Self::Parentage,
        Self::SupportNumber,
        Self::LegalAge,
        Self::ResidencePlace1,
        Self::ResidencePlace2,
        Self::ResidencePlace3,
        Self::Birthplace2,
        Self::Birthplace3,
        Self::QrExpiry,
    ];

    /// Returns the [`FieldTag`] for the tag byte, or [`None`] for unknown tags.
    pub fn from_byte(byte: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| tag.byte() == byte)
    }

    /// The tag byte.
    pub fn byte(self) -> u8 {
        self as u8
    }
}

/// Mapping of tags to the raw field values, borrowed from the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTable<'a> {
    fields: BTreeMap<u8, &'a [u8]>,
}

impl<'a> FieldTable<'a> {
    /// Returns the value of a known field.
    pub fn get(&self, tag: FieldTag) -> Option<&'a [u8]> {
        self.get_raw(tag.byte())
    }

    /// Returns the value of any field, known or not.
    pub fn get_raw(&self, tag: u8) -> Option<&'a [u8]> {
        self.fields.get(&tag).copied()
    }

    /// Returns the value of a known field as text.
    ///
    /// Absent fields are the empty string; invalid UTF-8 is replaced with `U+FFFD`.
    pub fn text(&self, tag: FieldTag) -> String {
        self.get(tag)
            .map(|value| String::from_utf8_lossy(value).into_owned())
            .unwrap_or_default()
    }

    /// Tags present in the table which are not a [`FieldTag`].
    pub fn unknown_tags(&self) -> impl Iterator<Item = u8> + '_ {
        self.fields
            .keys()
            .copied()
            .filter(|&tag| FieldTag::from_byte(tag).is_none())
    }

    /// Number of fields in the table.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the table has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn insert(&mut self, tag: u8, value: &'a [u8]) {
        // Repeated tags keep the last value.
        self.fields.insert(tag, value);
    }
}

/// The signature field and the data it signs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureBlock<'a> {
    signed_region: &'a [u8],
    signature: &'a [u8],
}

impl<'a> SignatureBlock<'a> {
    #[cfg(test)]
    pub(crate) fn new(signed_region: &'a [u8], signature: &'a [u8]) -> Self {
        Self {
            signed_region,
            signature,
        }
    }

    /// All of the payload bytes preceding the signature tag.
    pub fn signed_region(&self) -> &'a [u8] {
        self.signed_region
    }

    /// The raw signature value.
    pub fn signature(&self) -> &'a [u8] {
        self.signature
    }
}

/// The outcome of a field table extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFields<'a> {
    /// The data fields.
    pub table: FieldTable<'a>,
    /// The signature, [`None`] if the payload ended without one.
    pub signature: Option<SignatureBlock<'a>>,
}

enum ScanState<'a> {
    Scanning { position: usize },
    DoneWithSignature(SignatureBlock<'a>),
    DoneWithoutSignature,
    Truncated { tag_position: usize },
}

/// Extracts the field table of the `payload`, starting at `offset`.
///
/// Extraction stops at the signature field, or at the end of the `payload`.
///
/// # Errors
///
/// A [`DniError::TruncatedPayload`] error is returned if a field length or value does not fit into
/// the `payload`.
pub fn extract_fields(payload: &[u8], offset: usize) -> Result<ExtractedFields<'_>> {
    let mut table = FieldTable::default();
    let mut state = ScanState::Scanning { position: offset };

    loop {
        state = match state {
            ScanState::Scanning { position } => scan_field(payload, position, &mut table),
            ScanState::DoneWithSignature(signature) => {
                tracing::debug!(fields = table.len(), "extracted signed field table");
                return Ok(ExtractedFields {
                    table,
                    signature: Some(signature),
                });
            }
            ScanState::DoneWithoutSignature => {
                tracing::debug!(fields = table.len(), "field table has no signature");
                return Ok(ExtractedFields {
                    table,
                    signature: None,
                });
            }
            ScanState::Truncated { tag_position } => {
                return Err(bherror::Error::root(DniError::TruncatedPayload)
                    .ctx(format!("field starting at offset {tag_position}")));
            }
        };
    }
}

fn scan_field<'a>(
    payload: &'a [u8],
    position: usize,
    table: &mut FieldTable<'a>,
) -> ScanState<'a> {
    let Some(&tag) = payload.get(position) else {
        return ScanState::DoneWithoutSignature;
    };

    let Some((length, value_start)) = read_length(payload, position + 1) else {
        return ScanState::Truncated {
            tag_position: position,
        };
    };

    let Some(value) = payload.get(value_start..value_start + length) else {
        return ScanState::Truncated {
            tag_position: position,
        };
    };

    if tag == SIGNATURE_TAG {
        return ScanState::DoneWithSignature(SignatureBlock {
            signed_region: &payload[..position],
            signature: value,
        });
    }

    table.insert(tag, value);

    ScanState::Scanning {
        position: value_start + length,
    }
}

/// Reads a field length at `position`, returning it along with the position of the value.
fn read_length(payload: &[u8], position: usize) -> Option<(usize, usize)> {
    match *payload.get(position)? {
        LENGTH_IN_NEXT_BYTE => {
            let length = *payload.get(position + 1)?;
            Some((usize::from(length), position + 2))
        }
        LENGTH_IN_NEXT_TWO_BYTES => {
            let length = payload.get(position + 1..position + 3)?;
            let length = u16::from_be_bytes([length[0], length[1]]);
            Some((usize::from(length), position + 3))
        }
        length => Some((usize::from(length), position + 1)),
    }
}
