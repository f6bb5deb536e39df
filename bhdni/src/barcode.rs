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

//! Interface to the optical barcode reader which extracts seals from camera frames.

/// A frame of RGBA pixels, four bytes per pixel, row by row.
#[derive(Debug, Clone, Copy)]
pub struct PixelRaster<'a> {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// The pixel data.
    pub rgba: &'a [u8],
}

/// Symbology of a barcode found in a [`PixelRaster`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BarcodeFormat {
    /// A QR code.
    QrCode,
    /// Any other symbology, by the name the reader uses.
    Other(String),
}

/// A barcode found in a [`PixelRaster`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarcodeResult {
    /// The raw bytes encoded in the barcode.
    pub bytes: Vec<u8>,
    /// The symbology of the barcode.
    pub format: BarcodeFormat,
}

/// An optical barcode reader.
pub trait BarcodeReader {
    /// Returns all barcodes found in the `raster`, possibly none.
    fn read(&self, raster: &PixelRaster<'_>) -> Vec<BarcodeResult>;
}

impl<T: BarcodeReader + ?Sized> BarcodeReader for &T {
    fn read(&self, raster: &PixelRaster<'_>) -> Vec<BarcodeResult> {
        (**self).read(raster)
    }
}

/// Returns the bytes of the first QR code the `reader` finds in the `raster`.
pub(crate) fn read_first_qr_code(
    reader: &impl BarcodeReader,
    raster: &PixelRaster<'_>,
) -> Option<Vec<u8>> {
    let results = reader.read(raster);
    tracing::debug!(count = results.len(), "barcode reader returned results");

    results
        .into_iter()
        .find(|result| result.format == BarcodeFormat::QrCode)
        .map(|result| result.bytes)
}
