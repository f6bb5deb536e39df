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

//! This crate decodes the QR code of the Spanish mobile DNI and verifies that it was signed by a
//! trusted issuer.
//!
//! The QR code carries a visible digital seal: a header whose text fields are [C40][bh_c40]
//! compacted, a tag-length-value table of the holder's data, including a JPEG 2000 portrait,
//! and a trailing ECDSA P-256 signature over everything before it.
//!
//! # Details
//!
//! The crate defines multiple modules, which can be roughly divided as follows.
//!
//!   * The high-level [`decoder`] module, whose [`Decoder`] runs the whole pipeline.
//!   * The stages of the pipeline: [`header`], [`fields`], [`document`] and [`signature`].
//!   * Trust configuration in [`trust`].
//!   * Interfaces to the platform: [`barcode`] readers, JPEG 2000 codecs and display resources
//!     for the portrait in [`photo`].
//!   * The [`error`] module describing the error values.
//!
//! Optical barcode reading and JPEG 2000 decoding are not implemented by this crate, the caller
//! supplies them through the [`BarcodeReader`] and [`ImageCodec`] traits.
//!
//! # Examples
//!
//! ```no_run
//! use bhdni::{BoxError, CertificateStore, DecodedImage, Decoder, ImageCodec};
//!
//! struct OpenJpeg;
//!
//! impl ImageCodec for OpenJpeg {
//!     fn decode(&self, _jpeg2000: &[u8]) -> Result<DecodedImage, BoxError> {
//!         // Hand the stream over to a JPEG 2000 decoder.
//!         unimplemented!()
//!     }
//! }
//!
//! /// Returns the bytes of the QR code captured by the camera.
//! fn scan_qr_code() -> Vec<u8> {
//!     unimplemented!()
//! }
//!
//! # fn main() -> bhdni::Result<()> {
//! let certificate_store: CertificateStore = [(
//!     "2274948240b9368f65e5c80febfe5ce4",
//!     "-----BEGIN CERTIFICATE-----\n...\n-----END CERTIFICATE-----",
//! )]
//! .into_iter()
//! .collect();
//!
//! let decoder = Decoder::new(certificate_store, OpenJpeg);
//!
//! let document = decoder.decode(&scan_qr_code())?;
//!
//! if document.signature_verified {
//!     println!("{} {}", document.given_name, document.surnames);
//! }
//! # Ok(())
//! # }
//! ```

pub mod barcode;
pub mod decoder;
pub mod document;
pub mod error;
pub mod fields;
pub mod header;
pub mod photo;
pub mod signature;
#[cfg(any(feature = "test-utils", test))]
pub mod test_utils;
pub mod trust;
mod utils;

pub use barcode::{BarcodeFormat, BarcodeReader, BarcodeResult, PixelRaster};
pub use decoder::Decoder;
pub use document::{AgeStatus, ParsedDocument};
pub use error::{DniError, Result};
pub use header::{DocumentHeader, VerificationKind};
pub use photo::{
    DataUri, DataUriBackend, DecodedImage, DisplayBackend, DisplayGuard, ImageCodec, Photo,
};
pub use signature::{check_signature, verify_signature, SignatureStatus};
pub use trust::CertificateStore;

/// Boxed error returned by the platform interfaces.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
