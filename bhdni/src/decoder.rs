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

//! The top-level [`Decoder`], which runs a seal through header decoding, field extraction,
//! result mapping and signature verification.

use crate::{
    barcode::{read_first_qr_code, BarcodeReader, PixelRaster},
    document::ParsedDocument,
    fields::extract_fields,
    header::decode_header,
    photo::ImageCodec,
    signature::SignatureStatus,
    trust::CertificateStore,
    DniError, Result,
};

/// Decodes and verifies DNI seals.
///
/// The decoder holds no mutable state, so a single instance may be shared between threads when
/// its image codec allows it.
#[derive(Debug, Clone)]
pub struct Decoder<C> {
    certificate_store: CertificateStore,
    image_codec: C,
}

impl<C: ImageCodec> Decoder<C> {
    /// Creates a decoder trusting the certificates of the `certificate_store` and decoding
    /// portraits with the `image_codec`.
    pub fn new(certificate_store: CertificateStore, image_codec: C) -> Self {
        Self {
            certificate_store,
            image_codec,
        }
    }

    /// The trusted certificates.
    pub fn certificate_store(&self) -> &CertificateStore {
        &self.certificate_store
    }

    /// Decodes the seal `payload`.
    ///
    /// A seal whose signature cannot be verified is still returned, with
    /// [`ParsedDocument::signature_verified`] set to `false`; the reason is in
    /// [`ParsedDocument::signature_status`].
    ///
    /// # Errors
    ///
    /// Fails if the payload is structurally invalid (see [`decode_header`] and
    /// [`extract_fields`]) or if the portrait cannot be decoded.
    pub fn decode(&self, payload: &[u8]) -> Result<ParsedDocument> {
        let header = decode_header(payload)?;
        let extracted = extract_fields(payload, header.field_table_offset())?;

        tracing::debug!(
            fields = extracted.table.len(),
            signed = extracted.signature.is_some(),
            "extracted field table"
        );

        let mut document =
            ParsedDocument::from_fields(header, &extracted.table, &self.image_codec)?;

        let status = SignatureStatus::check(
            extracted.signature.as_ref(),
            document.certificate_reference(),
            &self.certificate_store,
        );
        document.set_signature_status(status);

        Ok(document)
    }

    /// Locates the first QR code the `reader` finds in the `raster` and decodes its payload.
    ///
    /// # Errors
    ///
    /// A [`DniError::BarcodeNotFound`] error is returned if the `raster` contains no QR code,
    /// otherwise fails as [`Decoder::decode`] does.
    pub fn decode_raster(
        &self,
        reader: &impl BarcodeReader,
        raster: &PixelRaster<'_>,
    ) -> Result<ParsedDocument> {
        let payload = read_first_qr_code(reader, raster).ok_or_else(|| {
            bherror::Error::root(DniError::BarcodeNotFound).ctx(format!(
                "no QR code in {}x{} raster",
                raster.width, raster.height
            ))
        })?;

        self.decode(&payload)
    }
}
