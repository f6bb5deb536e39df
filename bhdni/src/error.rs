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

//! This module defines the error values returned by the crate API.

/// Error type used across the crate API.
#[derive(strum_macros::Display, Debug, PartialEq, Clone)]
pub enum DniError {
    /// The first byte of the payload is not the visible digital seal magic.
    #[strum(to_string = "Unrecognized document, magic byte is {0:#04x}")]
    UnsupportedFormat(u8),
    /// The header version is not supported.
    #[strum(to_string = "Unsupported document version {0:#04x}")]
    UnsupportedVersion(u8),
    /// A fixed header read or a field table read ran past the end of the payload.
    #[strum(to_string = "Payload is truncated")]
    TruncatedPayload,
    /// The header is structurally invalid, e.g. the certificate reference length is not hex.
    #[strum(to_string = "Malformed document header")]
    MalformedHeader,
    /// A date could not be constructed from its encoded components.
    #[strum(to_string = "Invalid date")]
    InvalidDate,
    /// The portrait is missing or the image codec failed to decode it.
    #[strum(to_string = "Failed to decode the portrait")]
    ImageDecode,
    /// The decoded portrait could not be encoded into a displayable format.
    #[strum(to_string = "Failed to encode the portrait")]
    PhotoEncoding,
    /// The certificate store has no entry for the given reference.
    #[strum(to_string = "No certificate for reference {0}")]
    CertificateNotFound(String),
    /// The stored certificate could not be parsed, or its key is not a P-256 key.
    #[strum(to_string = "Invalid certificate")]
    InvalidCertificate,
    /// The signature is not a 64 byte `r || s` value.
    #[strum(to_string = "Invalid signature encoding, expected 64 bytes but got {0}")]
    InvalidSignatureEncoding(usize),
    /// The signature does not match the signed data.
    #[strum(to_string = "Signature validation failed")]
    InvalidSignature,
    /// The cryptographic backend failed unexpectedly.
    #[strum(to_string = "Crypto backend failed")]
    CryptoBackend,
    /// The barcode reader found no QR code in the raster.
    #[strum(to_string = "No QR code found")]
    BarcodeNotFound,
    /// The display backend failed to acquire a resource for the portrait.
    #[strum(to_string = "Failed to acquire a display resource")]
    DisplayResource,
}

impl bherror::BhError for DniError {}

/// Type alias for [`bherror::Result`] types returned by the crate's API.
pub type Result<T> = bherror::Result<T, DniError>;
