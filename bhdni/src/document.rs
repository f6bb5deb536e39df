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

//! This module maps the extracted fields onto the [`ParsedDocument`] returned to the caller.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    fields::{FieldTable, FieldTag},
    header::DocumentHeader,
    photo::{ImageCodec, Photo},
    signature::SignatureStatus,
    utils::date::lenient_date_time,
    DniError, Result,
};

/// Whether the holder is of legal age.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeStatus {
    /// The holder is of legal age.
    Adult,
    /// The holder is under age.
    Minor,
    /// The document does not state it.
    Unspecified,
}

impl AgeStatus {
    /// Interprets the legal age field, a big-endian unsigned integer which is `1` for adults.
    pub fn from_field(value: Option<&[u8]>) -> Self {
        match value {
            None | Some([]) => Self::Unspecified,
            Some(bytes) => {
                // Accumulated in 32 bits; leading bytes beyond that are shifted out.
                let value = bytes
                    .iter()
                    .fold(0u32, |value, &byte| (value << 8) | u32::from(byte));

                if value == 1 {
                    Self::Adult
                } else {
                    Self::Minor
                }
            }
        }
    }
}

/// The data of a decoded identity document.
///
/// Text attributes absent from the seal are empty strings, absent dates are [`None`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedDocument {
    /// The seal header.
    pub header: DocumentHeader,
    /// Number of the identity document.
    pub document_number: String,
    /// Given name.
    pub given_name: String,
    /// Surnames.
    pub surnames: String,
    /// Sex.
    pub sex: String,
    /// Date of birth.
    pub birth_date: Option<DateTime<Utc>>,
    /// Expiry of the identity document.
    pub expiry_date: Option<DateTime<Utc>>,
    /// Address.
    pub address: String,
    /// The three parts of the place of residence.
    pub residence_place: [String; 3],
    /// The three parts of the birthplace.
    pub birthplace: [String; 3],
    /// Nationality.
    pub nationality: String,
    /// Names of the parents.
    pub parentage: String,
    /// Number of the physical support of the document.
    pub support_number: String,
    /// Whether the holder is of legal age.
    pub age_status: AgeStatus,
    /// Expiry of the QR code itself.
    pub qr_expiry: Option<DateTime<Utc>>,
    /// The portrait.
    pub photo: Photo,
    /// Whether the seal signature was verified against a trusted certificate.
    pub signature_verified: bool,
    /// Detailed outcome of the signature verification.
    pub signature_status: SignatureStatus,
}

impl ParsedDocument {
    /// Maps the `fields` and the `header` onto a document, decoding the portrait with the
    /// `image_codec`.
    ///
    /// The signature is not checked here; the document starts out [`SignatureStatus::Unsigned`].
    ///
    /// # Errors
    ///
    /// A [`DniError::ImageDecode`] error is returned if the portrait is missing or cannot be
    /// decoded.
    pub fn from_fields(
        header: DocumentHeader,
        fields: &FieldTable<'_>,
        image_codec: &impl ImageCodec,
    ) -> Result<Self> {
        let photo = fields.get(FieldTag::Photo).ok_or_else(|| {
            bherror::Error::root(DniError::ImageDecode).ctx("document has no portrait")
        })?;
        let photo = Photo::from_jpeg2000(photo, image_codec)?;

        let date = |tag| parse_utc_date_time(&fields.text(tag));

        Ok(Self {
            header,
            document_number: fields.text(FieldTag::DocumentNumber),
            given_name: fields.text(FieldTag::GivenName),
            surnames: fields.text(FieldTag::Surnames),
            sex: fields.text(FieldTag::Sex),
            birth_date: date(FieldTag::BirthDate),
            expiry_date: date(FieldTag::ExpiryDate),
            address: fields.text(FieldTag::Address),
            residence_place: [
                fields.text(FieldTag::ResidencePlace1),
                fields.text(FieldTag::ResidencePlace2),
                fields.text(FieldTag::ResidencePlace3),
            ],
            birthplace: [
                fields.text(FieldTag::Birthplace1),
                fields.text(FieldTag::Birthplace2),
                fields.text(FieldTag::Birthplace3),
            ],
            nationality: fields.text(FieldTag::Nationality),
            parentage: fields.text(FieldTag::Parentage),
            support_number: fields.text(FieldTag::SupportNumber),
            age_status: AgeStatus::from_field(fields.get(FieldTag::LegalAge)),
            qr_expiry: date(FieldTag::QrExpiry),
            photo,
            signature_verified: false,
            signature_status: SignatureStatus::Unsigned,
        })
    }

    /// Reference of the certificate which signed the document.
    pub fn certificate_reference(&self) -> &str {
        &self.header.certificate_reference
    }

    /// Records the outcome of the signature verification.
    pub(crate) fn set_signature_status(&mut self, status: SignatureStatus) {
        self.signature_verified = status.is_verified();
        self.signature_status = status;
    }
}

/// Parses `dd-mm-yyyy` or `dd-mm-yyyy hh:mm:ss` as a UTC instant.
///
/// Missing time components are zero.  The empty string is [`None`], and so is malformed text,
/// which is logged.
pub fn parse_utc_date_time(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let parsed = parse_components(text).and_then(|[day, month, year, hour, minute, second]| {
        lenient_date_time(year, month - 1, day, hour, minute, second)
    });

    if parsed.is_none() {
        tracing::warn!(text, "ignoring malformed date");
    }

    parsed.map(|date_time| date_time.and_utc())
}

/// Splits the text into day, month, year, hour, minute & second.
///
/// Date and time are separated by the first space; anything after a second space is ignored.
/// Empty components count as zero, e.g. `13:` is `13:00:00`.
fn parse_components(text: &str) -> Option<[i64; 6]> {
    let mut parts = text.split(' ');
    let date = parts.next()?;
    let time = parts.next().filter(|time| !time.is_empty());

    let mut date = date.split('-').map(parse_component);
    let day = date.next()??;
    let month = date.next()??;
    let year = date.next()??;

    let mut components = [day, month, year, 0, 0, 0];

    if let Some(time) = time {
        for (component, part) in components[3..].iter_mut().zip(time.split(':')) {
            *component = parse_component(part)?;
        }
    }

    Some(components)
}

fn parse_component(part: &str) -> Option<i64> {
    if part.is_empty() {
        return Some(0);
    }
    part.parse().ok()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::TimeZone as _;

    use super::*;
    use crate::{
        fields::extract_fields,
        header::decode_header,
        test_utils::{FailingCodec, PayloadBuilder, SolidCodec},
    };

    fn utc(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec).unwrap()
    }

    fn map(payload: &[u8]) -> Result<ParsedDocument> {
        let header = decode_header(payload)?;
        let extracted = extract_fields(payload, header.field_table_offset())?;
        ParsedDocument::from_fields(header, &extracted.table, &SolidCodec::gray(1, 1, 0))
    }

    #[test]
    fn test_from_fields() {
        let payload = PayloadBuilder::new()
            .field(0x40, "99999999R")
            .field(0x42, "01-02-1990")
            .field(0x44, "CARMEN")
            .field(0x46, "ESPAÑOLA ESPAÑOLA")
            .field(0x48, "F")
            .field(0x4C, "31-12-2030")
            .field(0x50, "jp2")
            .field(0x60, "AVDA DE MADRID 1")
            .field(0x62, "MADRID")
            .field(0x64, "ESP")
            .field(0x66, "JUAN / CARMEN")
            .field(0x68, "ABC123456")
            .field(0x70, [0x01])
            .field(0x72, "MADRID")
            .field(0x74, "MADRID")
            .field(0x76, "ESPAÑA")
            .field(0x78, "MADRID")
            .field(0x7A, "ESPAÑA")
            .field(0x80, "04-03-2024 13:09:35")
            .unsigned();

        let document = map(&payload).unwrap();

        assert_eq!(document.document_number, "99999999R");
        assert_eq!(document.birth_date, Some(utc(1990, 2, 1, 0, 0, 0)));
        assert_eq!(document.given_name, "CARMEN");
        assert_eq!(document.surnames, "ESPAÑOLA ESPAÑOLA");
        assert_eq!(document.sex, "F");
        assert_eq!(document.expiry_date, Some(utc(2030, 12, 31, 0, 0, 0)));
        assert_eq!(document.address, "AVDA DE MADRID 1");
        assert_eq!(document.residence_place, ["MADRID", "MADRID", "ESPAÑA"]);
        assert_eq!(document.birthplace, ["MADRID", "MADRID", "ESPAÑA"]);
        assert_eq!(document.nationality, "ESP");
        assert_eq!(document.parentage, "JUAN / CARMEN");
        assert_eq!(document.support_number, "ABC123456");
        assert_eq!(document.age_status, AgeStatus::Adult);
        assert_eq!(document.qr_expiry, Some(utc(2024, 3, 4, 13, 9, 35)));
        assert_eq!(document.photo.width, 1);
        assert!(!document.signature_verified);
        assert_eq!(document.signature_status, SignatureStatus::Unsigned);
        assert_eq!(
            document.certificate_reference(),
            document.header.certificate_reference
        );
    }

    #[test]
    fn test_from_fields_absent_fields_are_empty() {
        let payload = PayloadBuilder::new().field(0x50, "jp2").unsigned();

        let document = map(&payload).unwrap();

        assert_eq!(document.document_number, "");
        assert_eq!(document.given_name, "");
        assert_eq!(document.birthplace, ["", "", ""]);
        assert_eq!(document.birth_date, None);
        assert_eq!(document.qr_expiry, None);
        assert_eq!(document.age_status, AgeStatus::Unspecified);
    }

    #[test]
    fn test_from_fields_missing_photo() {
        let payload = PayloadBuilder::new().field(0x40, "99999999R").unsigned();

        assert_matches!(map(&payload).unwrap_err().error, DniError::ImageDecode);
    }

    #[test]
    fn test_from_fields_photo_decode_failure() {
        let payload = PayloadBuilder::new().field(0x50, "jp2").unsigned();
        let header = decode_header(&payload).unwrap();
        let extracted = extract_fields(&payload, header.field_table_offset()).unwrap();

        let err =
            ParsedDocument::from_fields(header, &extracted.table, &FailingCodec).unwrap_err();

        assert_matches!(err.error, DniError::ImageDecode);
    }

    #[test]
    fn test_serialize() {
        let payload = PayloadBuilder::new()
            .field(0x42, "01-02-1990")
            .field(0x50, "jp2")
            .field(0x70, [0x00])
            .unsigned();
        let document = map(&payload).unwrap();

        let json = serde_json::to_value(&document).unwrap();

        assert_eq!(json["birth_date"], "1990-02-01T00:00:00Z");
        assert_eq!(json["expiry_date"], serde_json::Value::Null);
        assert_eq!(json["age_status"], "minor");
        assert_eq!(json["signature_status"], "unsigned");
        assert_eq!(json["header"]["issuance_date"], "2024-03-04");
        assert_eq!(json["header"]["verification_kind"], "FULL");
        assert!(json["header"].get("field_table_offset").is_none());
        assert!(json["photo"]["png_base64"]
            .as_str()
            .unwrap()
            .starts_with("iVBORw0KGgo"));
    }

    #[test]
    fn test_age_status() {
        assert_eq!(AgeStatus::from_field(Some(&[0x01])), AgeStatus::Adult);
        assert_eq!(AgeStatus::from_field(Some(&[0x00])), AgeStatus::Minor);
        assert_eq!(AgeStatus::from_field(Some(&[0x02])), AgeStatus::Minor);
        assert_eq!(AgeStatus::from_field(Some(&[0x00, 0x01])), AgeStatus::Adult);
        assert_eq!(AgeStatus::from_field(Some(&[0x01, 0x00])), AgeStatus::Minor);
        assert_eq!(
            AgeStatus::from_field(Some(&[0x01, 0x00, 0x00, 0x00, 0x01])),
            AgeStatus::Adult
        );
        assert_eq!(AgeStatus::from_field(Some(&[])), AgeStatus::Unspecified);
        assert_eq!(AgeStatus::from_field(None), AgeStatus::Unspecified);
    }

    #[test]
    fn test_parse_utc_date_time() {
        assert_eq!(
            parse_utc_date_time("04-03-2024 13:09:35"),
            Some(utc(2024, 3, 4, 13, 9, 35))
        );
        assert_eq!(
            parse_utc_date_time("04-03-2024"),
            Some(utc(2024, 3, 4, 0, 0, 0))
        );
        assert_eq!(
            parse_utc_date_time(" 04-03-2024 13 "),
            Some(utc(2024, 3, 4, 13, 0, 0))
        );
        assert_eq!(
            parse_utc_date_time("04-03-2024 13:09"),
            Some(utc(2024, 3, 4, 13, 9, 0))
        );
    }

    #[test]
    fn test_parse_utc_date_time_separators() {
        // Only the first space separates the time.
        assert_eq!(
            parse_utc_date_time("04-03-2024  13:09:35"),
            Some(utc(2024, 3, 4, 0, 0, 0))
        );
        assert_eq!(
            parse_utc_date_time("04-03-2024 13:09:35 extra"),
            Some(utc(2024, 3, 4, 13, 9, 35))
        );
        assert_eq!(
            parse_utc_date_time("04-03-2024 13:"),
            Some(utc(2024, 3, 4, 13, 0, 0))
        );
        assert_eq!(
            parse_utc_date_time("04-03-2024 :30"),
            Some(utc(2024, 3, 4, 0, 30, 0))
        );
    }

    #[test]
    fn test_parse_utc_date_time_two_digit_year() {
        assert_eq!(
            parse_utc_date_time("04-03-24"),
            Some(utc(24, 3, 4, 0, 0, 0))
        );
    }

    #[test]
    fn test_parse_utc_date_time_rolls_over() {
        assert_eq!(
            parse_utc_date_time("32-12-2023"),
            Some(utc(2024, 1, 1, 0, 0, 0))
        );
        assert_eq!(
            parse_utc_date_time("31-12-2023 24:00:00"),
            Some(utc(2024, 1, 1, 0, 0, 0))
        );
    }

    #[test]
    fn test_parse_utc_date_time_malformed() {
        assert_eq!(parse_utc_date_time(""), None);
        assert_eq!(parse_utc_date_time("   "), None);
        assert_eq!(parse_utc_date_time("04-03"), None);
        assert_eq!(parse_utc_date_time("04/03/2024"), None);
        assert_eq!(parse_utc_date_time("04-03-2024 1x:00:00"), None);
    }
}
