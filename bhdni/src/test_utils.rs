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

//! Fixtures for tests: a builder of seal payloads, a throwaway ES256 issuer and fake
//! collaborators.
//!
//! Do NOT use this module in production code, but only tests.

use openssl::{
    asn1::Asn1Time,
    bn::BigNum,
    ec::{EcGroup, EcKey},
    ecdsa::EcdsaSig,
    hash::MessageDigest,
    pkey::{PKey, Private},
    x509::{X509NameBuilder, X509},
};

use crate::{
    barcode::{BarcodeReader, BarcodeResult, PixelRaster},
    fields::SIGNATURE_TAG,
    header::{MAGIC, VERSION},
    photo::{DecodedImage, ImageCodec},
    signature::ELLIPTIC_CURVE_NID,
    utils::digest::sha256,
    BoxError,
};

/// Reference of the certificate [`PayloadBuilder`] puts into headers by default.
pub const TEST_CERTIFICATE_REFERENCE: &str = "4D393EEC9AD3289964D22FB9F744A884";

/// Reference of [`SPANISH_TEST_CERTIFICATE`].
pub const SPANISH_TEST_CERTIFICATE_REFERENCE: &str = "2274948240b9368f65e5c80febfe5ce4";

/// A seal signing certificate of the Spanish police, published for testing, with 80 column
/// PEM lines.
pub const SPANISH_TEST_CERTIFICATE: &str = "-----BEGIN CERTIFICATE-----
MIIIPDCCBiSgAwIBAgIQInSUgkC5No9l5cgP6/5c5DANBgkqhkiG9w0BAQsFADB0MQswCQYDVQQGEwJF
UzEoMCYGA1UECgwfRElSRUNDSU9OIEdFTkVSQUwgREUgTEEgUE9MSUNJQTEMMAoGA1UECwwDQ05QMRgw
FgYDVQRhDA9WQVRFUy1TMjgxNjAxNUgxEzARBgNVBAMMCkFDIERHUCAwMDQwHhcNMjQwMzA0MTMwOTM1
WhcNMjkwMzA0MTMwOTM1WjCBozELMAkGA1UEBhMCRVMxIDAeBgNVBAoTF01JTklTVEVSSU8gREVMIElO
VEVSSU9SMRowGAYDVQQLExFTRUxMTyBFTEVDVFJPTklDTzEjMCEGA1UECxMaQ1VFUlBPIE5BQ0lPTkFM
IERFIFBPTElDSUExGDAWBgNVBGETD1ZBVEVTLVMyODE2MDE1SDEXMBUGA1UEAxMOQVBQRE5JTU9WSUxQ
UkUwWTATBgcqhkjOPQIBBggqhkjOPQMBBwNCAARBfpojvXY9rbDS0VB2THZuTjX7Ii807tkKnAZZwbIO
Et3FdGykeOHv9tt5PxPD/kr2io50wL1r2MGawBTo7wBpo4IEYzCCBF8wDAYDVR0TAQH/BAIwADAOBgNV
HQ8BAf8EBAMCBeAwHQYDVR0OBBYEFFIE+56N46OfWO0z/Yw9z3GQmIcmMB8GA1UdIwQYMBaAFA2n5MC0
15fkdNyGfFL+9N4yYjK8MIG6BggrBgEFBQcBAwSBrTCBqjAIBgYEAI5GAQEwCwYGBACORgEDAgEPMAgG
BgQAjkYBBDATBgYEAI5GAQYwCQYHBACORgEGAjByBgYEAI5GAQUwaDAyFixodHRwczovL3BraS5wb2xp
Y2lhLmVzL2NucC9wdWJsaWNhY2lvbmVzL3BkcxMCZW4wMhYsaHR0cHM6Ly9wa2kucG9saWNpYS5lcy9j
bnAvcHVibGljYWNpb25lcy9wZHMTAmVzMGkGCCsGAQUFBwEBBF0wWzAiBggrBgEFBQcwAYYWaHR0cDov
L29jc3AucG9saWNpYS5lczA1BggrBgEFBQcwAoYpaHR0cDovL3BraS5wb2xpY2lhLmVzL2NucC9jZXJ0
cy9BQzAwNC5jcnQwggEuBgNVHSAEggElMIIBITCCAQYGCGCFVAECAWY5MIH5MDcGCCsGAQUFBwIBFito
dHRwOi8vcGtpLnBvbGljaWEuZXMvY25wL3B1YmxpY2FjaW9uZXMvZHBjMIG9BggrBgEFBQcCAjCBsAyB
rVFDQzogc2VsbG8gZWxlY3Ryw7NuaWNvIGRlIEFkbWluaXN0cmFjacOzbiwgw7NyZ2FubyBvIGVudGlk
YWQgZGUgZGVyZWNobyBww7pibGljbywgbml2ZWwgYWx0by4gQ29uc3VsdGUgbGFzIGNvbmRpY2lvbmVz
IGRlIHVzbyBlbiBodHRwOi8vcGtpLnBvbGljaWEuZXMvY25wL3B1YmxpY2FjaW9uZXMvZHBjMAkGBwQA
i+xAAQMwCgYIYIVUAQMFBgEwgbUGA1UdHwSBrTCBqjCBp6AqoCiGJmh0dHA6Ly9wa2kucG9saWNpYS5l
cy9jbnAvY3Jscy9DUkwuY3JsonmkdzB1MQswCQYDVQQGEwJFUzEoMCYGA1UECgwfRElSRUNDSU9OIEdF
TkVSQUwgREUgTEEgUE9MSUNJQTEMMAoGA1UECwwDQ05QMRgwFgYDVQRhDA9WQVRFUy1TMjgxNjAxNUgx
FDASBgNVBAMMC0FSQyBER1AgMDAyMIHNBgNVHREEgcUwgcKBDnBraUBwb2xpY2lhLmVzpDIwMDEuMCwG
CWCFVAEDBQYBARYfU0VMTE8gRUxFQ1RST05JQ08gREUgTklWRUwgQUxUT6Q7MDkxNzA1BglghVQBAwUG
AQIWKEFNQklUTyBERUwgQ1VFUlBPIE5BQ0lPTkFMIERFIExBIFBPTElDSUGkHDAaMRgwFgYJYIVUAQMF
BgEDFglTMjgxNjAxNUikITAfMR0wGwYJYIVUAQMFBgEFFg5BUFBETklNT1ZJTFBSRTAdBgNVHSUEFjAU
BggrBgEFBQcDBAYIKwYBBQUHAwIwDQYJKoZIhvcNAQELBQADggIBADRybjPKB0n/vmbyRnnZ5FgYp1qt
F/UaozwxcwgAGpcxIFxNC9iqohC6DrAC6pO9MUzdbzB3VnKam6/gYsNJmXAkPf/2SEuZJBTqP3HlrRet
PPJ+BsTRDueN4nA5MWj7GGpYIvjci15Iz1RONgOrZpG2wT6kTH07KM7dJ0e2q0+iU4JH3dj9eFcNd+cs
NjOrWFTS55gDU2Pxjul33r1d2Vi3ymBpQCzgxX7RczwgYcrmtiWFbwpqc/ZmIqrqt6jI2vV2cxRr4s4v
wKY3RQf2rRvhF/39o9YvYUyjxWaR9/DjhF+LdOBUSJhU0OyAjvOYTtYHThWjMWAKEUrUU4ilBgbFZTwS
aFXCSB7kMAImMt93tmhzAx0lBfYP4NRK/H8L4cr1mnvqNI2NFGWiYFlIcySKcyqGqNjn7zlgQdRotnW1
rqvhe0UyQuO98uVkSBN3Xzo6VGTgVBEVquwP1QT9lgv5+7LtaycjKpADmX3m4tdf/whnHCtKVUpWA+iq
Pwjytqef2VjzoQIWX2knt2uHMHRBmt6ktR5vKelv0ewEZloYCsT+2SPuo3rpd9EOJkLl02O9UG7T0lhw
1UvFkJ5wMfjK8+gc/5x5hGe8Fzcg4culTrIBTTq2HhQ45wBHRYUXNNOHGyi0AqC0Vo5JnB6NjDXkMkQr
WGmckU12Ztc72pg0
-----END CERTIFICATE-----";

/// Packs the date into 3 bytes as the decimal number `MMDDYYYY`.
pub fn pack_date(year: u32, month: u32, day: u32) -> [u8; 3] {
    let [_, bytes @ ..] = (month * 1_000_000 + day * 10_000 + year).to_be_bytes();
    bytes
}

/// Encodes the length of a field value the way the field table does.
pub fn encode_length(length: usize) -> Vec<u8> {
    match length {
        0..=0x80 => vec![length as u8],
        0x81..=0xFF => vec![0x81, length as u8],
        _ => {
            let length = u16::try_from(length).unwrap();
            let [high, low] = length.to_be_bytes();
            vec![0x82, high, low]
        }
    }
}

/// Assembles seal payloads.
///
/// The defaults describe a fully verifiable Spanish DNI issued and signed on 2024-03-04.
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    magic: u8,
    version: u8,
    issuing_country: String,
    signer_id: String,
    certificate_reference: String,
    issuance_date: [u8; 3],
    signature_date: [u8; 3],
    verification_kind: u8,
    document_category: u8,
    fields: Vec<u8>,
}

impl Default for PayloadBuilder {
    fn default() -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            issuing_country: "ESP".to_owned(),
            signer_id: "ESPN".to_owned(),
            certificate_reference: TEST_CERTIFICATE_REFERENCE.to_owned(),
            issuance_date: pack_date(2024, 3, 4),
            signature_date: pack_date(2024, 3, 4),
            verification_kind: 0x08,
            document_category: 0x09,
            fields: Vec::new(),
        }
    }
}

impl PayloadBuilder {
    /// Creates a builder with the default header and no fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the magic byte.
    pub fn magic(mut self, magic: u8) -> Self {
        self.magic = magic;
        self
    }

    /// Sets the version byte.
    pub fn version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    /// Sets the certificate reference; its length must not be `1` modulo `3`.
    pub fn certificate_reference(mut self, certificate_reference: &str) -> Self {
        self.certificate_reference = certificate_reference.to_owned();
        self
    }

    /// Sets the packed issuance date.
    pub fn issuance_date(mut self, date: [u8; 3]) -> Self {
        self.issuance_date = date;
        self
    }

    /// Sets the packed signature date.
    pub fn signature_date(mut self, date: [u8; 3]) -> Self {
        self.signature_date = date;
        self
    }

    /// Sets the verification kind byte.
    pub fn verification_kind(mut self, verification_kind: u8) -> Self {
        self.verification_kind = verification_kind;
        self
    }

    /// Sets the document category byte.
    pub fn document_category(mut self, document_category: u8) -> Self {
        self.document_category = document_category;
        self
    }

    /// Appends a field to the field table.
    pub fn field(mut self, tag: u8, value: impl AsRef<[u8]>) -> Self {
        let value = value.as_ref();
        self.fields.push(tag);
        self.fields.extend(encode_length(value.len()));
        self.fields.extend_from_slice(value);
        self
    }

    /// The encoded header.
    pub fn header_bytes(&self) -> Vec<u8> {
        let signer_block = format!(
            "{}{:02X}",
            self.signer_id,
            self.certificate_reference.len()
        );

        let mut bytes = vec![self.magic, self.version];
        bytes.extend(bh_c40::encode(&self.issuing_country).unwrap());
        bytes.extend(bh_c40::encode(&signer_block).unwrap());
        bytes.extend(bh_c40::encode(&self.certificate_reference).unwrap());
        bytes.extend(self.issuance_date);
        bytes.extend(self.signature_date);
        bytes.push(self.verification_kind);
        bytes.push(self.document_category);
        bytes
    }

    /// The header followed by the field table, without a signature.
    pub fn unsigned(&self) -> Vec<u8> {
        let mut bytes = self.header_bytes();
        bytes.extend_from_slice(&self.fields);
        bytes
    }

    /// The unsigned payload followed by the given `signature` field.
    pub fn with_signature(&self, signature: &[u8]) -> Vec<u8> {
        let mut bytes = self.unsigned();
        bytes.push(SIGNATURE_TAG);
        bytes.extend(encode_length(signature.len()));
        bytes.extend_from_slice(signature);
        bytes
    }

    /// The unsigned payload followed by its signature by the `issuer`.
    pub fn signed(&self, issuer: &TestIssuer) -> Vec<u8> {
        let signature = issuer.sign(&self.unsigned());
        self.with_signature(&signature)
    }
}

/// An ES256 issuer with a freshly generated key and a self-signed certificate.
pub struct TestIssuer {
    key: EcKey<Private>,
    certificate: X509,
}

impl TestIssuer {
    /// Generates a P-256 key and a certificate for it.
    pub fn generate() -> Self {
        let group = EcGroup::from_curve_name(ELLIPTIC_CURVE_NID).unwrap();
        let key = EcKey::generate(&group).unwrap();
        let pkey = PKey::from_ec_key(key.clone()).unwrap();

        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_text("C", "ES").unwrap();
        name.append_entry_by_text("CN", "TEST SEAL ISSUER").unwrap();
        let name = name.build();

        let serial_number = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
        let not_before = Asn1Time::days_from_now(0).unwrap();
        let not_after = Asn1Time::days_from_now(365).unwrap();

        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        builder.set_serial_number(&serial_number).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(&pkey).unwrap();
        builder.set_not_before(&not_before).unwrap();
        builder.set_not_after(&not_after).unwrap();
        builder.sign(&pkey, MessageDigest::sha256()).unwrap();

        Self {
            key,
            certificate: builder.build(),
        }
    }

    /// The PEM encoded certificate.
    pub fn certificate_pem(&self) -> String {
        String::from_utf8(self.certificate.to_pem().unwrap()).unwrap()
    }

    /// Signs the SHA-256 digest of the `message`, returning the raw 64 byte `r || s` signature.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let signature = EcdsaSig::sign(&sha256(message), &self.key).unwrap();

        let mut raw = signature.r().to_vec_padded(32).unwrap();
        raw.extend(signature.s().to_vec_padded(32).unwrap());
        raw
    }
}

/// An [`ImageCodec`] which ignores its input and returns a raster of a single color.
#[derive(Debug, Clone)]
pub struct SolidCodec {
    width: u32,
    height: u32,
    samples: Vec<u8>,
}

impl SolidCodec {
    /// A codec returning red, green & blue components.
    pub fn rgb(width: u32, height: u32, [red, green, blue]: [u8; 3]) -> Self {
        Self {
            width,
            height,
            samples: vec![red, green, blue],
        }
    }

    /// A codec returning a single luminance component.
    pub fn gray(width: u32, height: u32, luminance: u8) -> Self {
        Self {
            width,
            height,
            samples: vec![luminance],
        }
    }
}

impl ImageCodec for SolidCodec {
    fn decode(&self, _jpeg2000: &[u8]) -> Result<DecodedImage, BoxError> {
        let pixels = (self.width * self.height) as usize;

        Ok(DecodedImage {
            width: self.width,
            height: self.height,
            components: self
                .samples
                .iter()
                .map(|&sample| vec![sample; pixels])
                .collect(),
        })
    }
}

/// An [`ImageCodec`] which always fails.
#[derive(Debug, Clone, Copy)]
pub struct FailingCodec;

impl ImageCodec for FailingCodec {
    fn decode(&self, _jpeg2000: &[u8]) -> Result<DecodedImage, BoxError> {
        Err("not a JPEG 2000 stream".into())
    }
}

/// A [`BarcodeReader`] which finds the same barcodes in every raster.
#[derive(Debug, Clone)]
pub struct FixedReader(pub Vec<BarcodeResult>);

impl BarcodeReader for FixedReader {
    fn read(&self, _raster: &PixelRaster<'_>) -> Vec<BarcodeResult> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::public_key_from_pem;

    #[test]
    fn test_pack_date() {
        // 03042024
        assert_eq!(pack_date(2024, 3, 4), [0x2E, 0x6A, 0xE8]);
    }

    #[test]
    fn test_encode_length() {
        assert_eq!(encode_length(0x05), [0x05]);
        assert_eq!(encode_length(0x80), [0x80]);
        assert_eq!(encode_length(0xC8), [0x81, 0xC8]);
        assert_eq!(encode_length(0x100), [0x82, 0x01, 0x00]);
    }

    #[test]
    fn test_default_header_length() {
        assert_eq!(PayloadBuilder::new().header_bytes().len(), 38);
    }

    #[test]
    fn test_issuer_certificate_matches_key() {
        let issuer = TestIssuer::generate();

        let public_key = public_key_from_pem(&issuer.certificate_pem()).unwrap();

        assert_eq!(
            public_key.public_key_to_der().unwrap(),
            issuer.key.public_key_to_der().unwrap()
        );
    }
}
