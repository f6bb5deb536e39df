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

//! This module decodes the fixed header of the seal which precedes the field table.
//!
//! | Offset | Length | Content                                                       |
//! |--------|--------|---------------------------------------------------------------|
//! | 0      | 1      | magic, always `0xDC`                                          |
//! | 1      | 1      | version, only `0x03` is supported                             |
//! | 2      | 2      | issuing country, C40                                          |
//! | 4      | 4      | signer identifier followed by the hex length of the reference |
//! | 8      | `n`    | certificate reference, C40                                    |
//! | 8 + n  | 3      | issuance date, packed                                         |
//! | 11 + n | 3      | signature date, packed                                        |
//! | 14 + n | 1      | verification kind                                             |
//! | 15 + n | 1      | document category                                             |

use bherror::traits::{ErrorContext as _, ForeignError as _};
use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    utils::{date::lenient_date, read_byte, read_bytes},
    DniError, Result,
};

/// The first byte of every supported payload.
pub const MAGIC: u8 = 0xDC;

/// The only supported header version.
pub const VERSION: u8 = 0x03;

const ISSUING_COUNTRY_OFFSET: usize = 2;
const ISSUING_COUNTRY_LENGTH: usize = 2;
const SIGNER_BLOCK_OFFSET: usize = 4;
const SIGNER_BLOCK_LENGTH: usize = 4;
const CERTIFICATE_REFERENCE_OFFSET: usize = 8;

/// Number of bytes following the certificate reference: two packed dates, the verification kind
/// and the document category.
const TRAILER_LENGTH: usize = 8;

/// Document category of the Spanish national identity document.
const SPANISH_DNI_CATEGORY: u8 = 0x09;

/// The extent of data the document discloses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationKind {
    /// Basic identity data.
    Simple,
    /// All of the holder's data.
    Full,
    /// Only whether the holder is of legal age.
    AgeOnly,
}

impl VerificationKind {
    /// Maps the header byte to a [`VerificationKind`], if it is a known one.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x07 => Some(Self::Simple),
            0x08 => Some(Self::Full),
            0x09 => Some(Self::AgeOnly),
            _ => None,
        }
    }
}

/// The decoded header of a seal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentHeader {
    /// The header version byte.
    pub version: u8,
    /// The issuing country code.
    pub issuing_country: String,
    /// Identifier of the signing entity.
    pub signer_id: String,
    /// Reference of the certificate which signed the document, as uppercase hex.
    pub certificate_reference: String,
    /// Date the document was issued.
    pub issuance_date: NaiveDate,
    /// Date the document was signed.
    pub signature_date: NaiveDate,
    /// [`None`] for verification kinds this crate does not know about.
    pub verification_kind: Option<VerificationKind>,
    /// Raw document category byte.
    pub document_category: u8,
    #[serde(skip)]
    field_table_offset: usize,
}

impl DocumentHeader {
    /// Offset of the first byte following the header.
    pub fn field_table_offset(&self) -> usize {
        self.field_table_offset
    }

    /// Whether the document category denotes a Spanish DNI.
    pub fn is_spanish_dni(&self) -> bool {
        self.document_category == SPANISH_DNI_CATEGORY
    }
}

/// Decodes the header from the start of the `payload`.
///
/// # Errors
///
/// Fails with [`DniError::UnsupportedFormat`] or [`DniError::UnsupportedVersion`] on the wrong
/// magic or version byte, with [`DniError::TruncatedPayload`] if the header does not fit into the
/// `payload` and with [`DniError::MalformedHeader`] if the certificate reference length is not
/// hex.
pub fn decode_header(payload: &[u8]) -> Result<DocumentHeader> {
    let magic = read_byte(payload, 0)?;
    if magic != MAGIC {
        return Err(bherror::Error::root(DniError::UnsupportedFormat(magic)));
    }

    let version = read_byte(payload, 1)?;
    if version != VERSION {
        return Err(bherror::Error::root(DniError::UnsupportedVersion(version)));
    }

    let issuing_country = c40_at(payload, ISSUING_COUNTRY_OFFSET, ISSUING_COUNTRY_LENGTH)?;
    let signer_block = c40_at(payload, SIGNER_BLOCK_OFFSET, SIGNER_BLOCK_LENGTH)?;
    let (signer_id, reference_length) = split_signer_block(&signer_block)?;

    let reference_byte_count = c40_byte_count(reference_length);
    let certificate_reference =
        c40_at(payload, CERTIFICATE_REFERENCE_OFFSET, reference_byte_count)?;

    let base = CERTIFICATE_REFERENCE_OFFSET + reference_byte_count;
    let trailer = read_bytes(payload, base, TRAILER_LENGTH).ctx(|| "header dates and kind")?;

    let issuance_date = decode_packed_date([trailer[0], trailer[1], trailer[2]])?;
    let signature_date = decode_packed_date([trailer[3], trailer[4], trailer[5]])?;
    let verification_kind = VerificationKind::from_byte(trailer[6]);
    let document_category = trailer[7];

    tracing::debug!(
        %issuing_country,
        %signer_id,
        %certificate_reference,
        "decoded seal header"
    );

    Ok(DocumentHeader {
        version,
        issuing_country,
        signer_id: signer_id.to_owned(),
        certificate_reference,
        issuance_date,
        signature_date,
        verification_kind,
        document_category,
        field_table_offset: base + TRAILER_LENGTH,
    })
}

/// Decodes a date packed into 3 bytes as the decimal number `MMDDYYYY`.
///
/// Out-of-range days and months are not rejected, they roll over into the neighbouring months &
/// years.
pub fn decode_packed_date(bytes: [u8; 3]) -> Result<NaiveDate> {
    let value = i64::from(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]));

    let year = value % 10_000;
    let month = value / 1_000_000 - 1;
    let day = (value / 10_000) % 100;

    lenient_date(year, month, day).ok_or_else(|| {
        bherror::Error::root(DniError::InvalidDate)
            .ctx(format!("packed date {value} is out of range"))
    })
}

/// Number of C40 bytes needed to encode `characters` characters, three per byte pair.
fn c40_byte_count(characters: u8) -> usize {
    (usize::from(characters) + 2) / 3 * 2
}

fn c40_at(payload: &[u8], offset: usize, length: usize) -> Result<String> {
    read_bytes(payload, offset, length).map(bh_c40::decode)
}

/// Splits the signer block into the signer identifier and the length of the certificate
/// reference, which is encoded by the last two characters as hex.
fn split_signer_block(signer_block: &str) -> Result<(&str, u8)> {
    let split = signer_block
        .len()
        .checked_sub(2)
        .filter(|&split| signer_block.is_char_boundary(split))
        .ok_or_else(|| {
            bherror::Error::root(DniError::MalformedHeader)
                .ctx(format!("signer block {signer_block:?} is too short"))
        })?;

    let (signer_id, length_hex) = signer_block.split_at(split);

    let mut length = [0u8; 1];
    hex::decode_to_slice(length_hex, &mut length)
        .foreign_err(|| DniError::MalformedHeader)
        .ctx(|| format!("certificate reference length {length_hex:?} is not hex"))?;

    Ok((signer_id, length[0]))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::test_utils::{pack_date, PayloadBuilder, TEST_CERTIFICATE_REFERENCE};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_decode_header() {
        let payload = PayloadBuilder::new()
            .issuance_date(pack_date(2024, 3, 4))
            .signature_date(pack_date(2024, 3, 5))
            .verification_kind(0x08)
            .unsigned();

        let header = decode_header(&payload).unwrap();

        assert_eq!(header.version, VERSION);
        assert_eq!(header.issuing_country, "ESP");
        assert_eq!(header.signer_id, "ESPN");
        assert_eq!(header.certificate_reference, TEST_CERTIFICATE_REFERENCE);
        assert_eq!(header.issuance_date, date(2024, 3, 4));
        assert_eq!(header.signature_date, date(2024, 3, 5));
        assert_eq!(header.verification_kind, Some(VerificationKind::Full));
        assert!(header.is_spanish_dni());
        // 8 fixed bytes, 22 bytes of reference, 8 bytes of dates, kind and category
        assert_eq!(header.field_table_offset(), 38);
    }

    #[test]
    fn test_decode_header_unknown_verification_kind() {
        let payload = PayloadBuilder::new().verification_kind(0x42).unsigned();

        let header = decode_header(&payload).unwrap();

        assert_eq!(header.verification_kind, None);
    }

    #[test]
    fn test_verification_kind_from_byte() {
        assert_eq!(
            VerificationKind::from_byte(0x07),
            Some(VerificationKind::Simple)
        );
        assert_eq!(VerificationKind::from_byte(0x08), Some(VerificationKind::Full));
        assert_eq!(
            VerificationKind::from_byte(0x09),
            Some(VerificationKind::AgeOnly)
        );
        assert_eq!(VerificationKind::from_byte(0x00), None);
    }

    #[test]
    fn test_decode_header_wrong_magic() {
        let payload = PayloadBuilder::new().magic(0xDD).unsigned();

        let err = decode_header(&payload).unwrap_err();

        assert_eq!(err.error, DniError::UnsupportedFormat(0xDD));
    }

    #[test]
    fn test_decode_header_wrong_version() {
        let payload = PayloadBuilder::new().version(0x02).unsigned();

        let err = decode_header(&payload).unwrap_err();

        assert_eq!(err.error, DniError::UnsupportedVersion(0x02));
    }

    #[test]
    fn test_decode_header_truncated() {
        let payload = PayloadBuilder::new().unsigned();

        for length in [0, 1, 5, 8, 29, 37] {
            let err = decode_header(&payload[..length]).unwrap_err();
            assert_matches!(err.error, DniError::TruncatedPayload, "{length}");
        }

        assert!(decode_header(&payload[..38]).is_ok());
    }

    #[test]
    fn test_decode_header_short_reference() {
        let payload = PayloadBuilder::new()
            .certificate_reference("ABCDE")
            .unsigned();

        let header = decode_header(&payload).unwrap();

        assert_eq!(header.certificate_reference, "ABCDE");
        assert_eq!(header.field_table_offset(), 8 + 4 + 8);
    }

    #[test]
    fn test_decode_header_non_hex_reference_length() {
        let mut payload = PayloadBuilder::new().unsigned();
        // "ESPNZZ"
        payload[4..8].copy_from_slice(&bh_c40::encode("ESPNZZ").unwrap());

        let err = decode_header(&payload).unwrap_err();

        assert_matches!(err.error, DniError::MalformedHeader);
    }

    #[test]
    fn test_decode_header_short_signer_block() {
        let mut payload = PayloadBuilder::new().unsigned();
        // Zero groups decode to nothing at all.
        payload[4..8].copy_from_slice(&[0, 0, 0, 0]);

        let err = decode_header(&payload).unwrap_err();

        assert_matches!(err.error, DniError::MalformedHeader);
    }

    #[test]
    fn test_decode_packed_date() {
        // 03042024 => 0x2E6AE8
        assert_eq!(
            decode_packed_date([0x2E, 0x6A, 0xE8]).unwrap(),
            date(2024, 3, 4)
        );
        assert_eq!(decode_packed_date(pack_date(1999, 12, 31)).unwrap(), date(1999, 12, 31));
    }

    #[test]
    fn test_decode_packed_date_rolls_over() {
        // month 13 of 2023
        let packed = 13012023u32.to_be_bytes();
        assert_eq!(
            decode_packed_date([packed[1], packed[2], packed[3]]).unwrap(),
            date(2024, 1, 1)
        );

        // month 0 is December of the previous year
        let packed = 152024u32.to_be_bytes();
        assert_eq!(
            decode_packed_date([packed[1], packed[2], packed[3]]).unwrap(),
            date(2023, 12, 15)
        );
    }

    #[test]
    fn test_c40_byte_count() {
        assert_eq!(c40_byte_count(0), 0);
        assert_eq!(c40_byte_count(1), 2);
        assert_eq!(c40_byte_count(3), 2);
        assert_eq!(c40_byte_count(4), 4);
        assert_eq!(c40_byte_count(32), 22);
    }
}
