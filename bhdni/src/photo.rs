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

//! This module turns the JPEG 2000 portrait of the document into a displayable PNG image.
//!
//! JPEG 2000 decoding is delegated to an external [`ImageCodec`].  Displaying the portrait is
//! delegated to a [`DisplayBackend`], whose resources are held by a [`DisplayGuard`] and released
//! as soon as the guard is released or dropped.

use std::{
    io::Cursor,
    sync::atomic::{AtomicU64, AtomicUsize, Ordering},
};

use bherror::traits::{ErrorContext as _, ForeignBoxed as _, ForeignError as _};
use image::{ImageFormat, RgbaImage};
use serde::{Serialize, Serializer};

use crate::{utils::base64::base64_encode, BoxError, DniError, Result};

/// MIME type of [`Photo::png`].
pub const PNG_MIME_TYPE: &str = "image/png";

/// A raster as produced by an [`ImageCodec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// One buffer of 8-bit samples per component, each `width * height` long, row-major.
    ///
    /// The first component is red or luminance; the second & third, if present, green and blue.
    pub components: Vec<Vec<u8>>,
}

impl DecodedImage {
    /// Number of components of the image.
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Synthesizes an opaque RGBA raster, using the first component for any missing colour.
    fn to_rgba(&self) -> Result<RgbaImage> {
        let pixels = usize::try_from(u64::from(self.width) * u64::from(self.height))
            .foreign_err(|| DniError::ImageDecode)
            .ctx(|| "portrait dimensions overflow")?;

        let red = self.component(0, pixels)?.ok_or_else(|| {
            bherror::Error::root(DniError::ImageDecode).ctx("portrait has no components")
        })?;
        let green = self.component(1, pixels)?.unwrap_or(red);
        let blue = self.component(2, pixels)?.unwrap_or(red);

        let mut rgba = Vec::with_capacity(pixels * 4);
        for i in 0..pixels {
            rgba.extend_from_slice(&[red[i], green[i], blue[i], u8::MAX]);
        }

        RgbaImage::from_raw(self.width, self.height, rgba).ok_or_else(|| {
            bherror::Error::root(DniError::ImageDecode).ctx("RGBA buffer does not fit dimensions")
        })
    }

    /// Returns the first `pixels` samples of the component at `index`, if the component exists.
    fn component(&self, index: usize, pixels: usize) -> Result<Option<&[u8]>> {
        let Some(samples) = self.components.get(index) else {
            return Ok(None);
        };

        samples.get(..pixels).map(Some).ok_or_else(|| {
            bherror::Error::root(DniError::ImageDecode).ctx(format!(
                "component {index} has {} samples, expected {pixels}",
                samples.len()
            ))
        })
    }
}

/// An external JPEG 2000 decoder.
pub trait ImageCodec {
    /// Decodes the JPEG 2000 byte stream into a raster.
    fn decode(&self, jpeg2000: &[u8]) -> std::result::Result<DecodedImage, BoxError>;
}

impl<T: ImageCodec + ?Sized> ImageCodec for &T {
    fn decode(&self, jpeg2000: &[u8]) -> std::result::Result<DecodedImage, BoxError> {
        (**self).decode(jpeg2000)
    }
}

/// The portrait of the holder, encoded as PNG.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Photo {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    #[serde(rename = "png_base64", serialize_with = "serialize_base64")]
    png: Vec<u8>,
}

impl Photo {
    /// Decodes the JPEG 2000 portrait with the `codec` and re-encodes it as PNG.
    ///
    /// # Errors
    ///
    /// A [`DniError::ImageDecode`] error is returned if the `codec` fails or returns an
    /// inconsistent raster, and a [`DniError::PhotoEncoding`] error if PNG encoding fails.
    pub fn from_jpeg2000(jpeg2000: &[u8], codec: &impl ImageCodec) -> Result<Self> {
        let decoded = codec
            .decode(jpeg2000)
            .foreign_boxed_err(|| DniError::ImageDecode)?;

        tracing::debug!(
            width = decoded.width,
            height = decoded.height,
            components = decoded.component_count(),
            "decoded portrait"
        );

        let raster = decoded.to_rgba()?;

        let mut png = Vec::new();
        raster
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .foreign_err(|| DniError::PhotoEncoding)?;

        Ok(Self {
            width: decoded.width,
            height: decoded.height,
            png,
        })
    }

    /// The PNG encoded portrait.
    pub fn png(&self) -> &[u8] {
        &self.png
    }

    /// The PNG encoded portrait as standard `base64`.
    pub fn base64(&self) -> String {
        base64_encode(&self.png)
    }

    /// Acquires a display resource for the portrait from the `backend`.
    ///
    /// The resource lives as long as the returned [`DisplayGuard`].
    pub fn display<'b, B: DisplayBackend>(&self, backend: &'b B) -> Result<DisplayGuard<'b, B>> {
        let handle = backend.acquire(&self.png, PNG_MIME_TYPE)?;
        Ok(DisplayGuard { backend, handle })
    }
}

fn serialize_base64<S>(png: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&base64_encode(png))
}

/// An environment specific store of displayable images, e.g. object URLs, files or textures.
pub trait DisplayBackend {
    /// The resource handed out for a displayed image.
    type Handle;

    /// Makes the `image` of the given `mime_type` displayable.
    ///
    /// Backends report their failures as [`DniError::DisplayResource`].
    fn acquire(&self, image: &[u8], mime_type: &str) -> Result<Self::Handle>;

    /// Frees the resource behind the `handle`.  Called exactly once per acquired handle.
    fn release(&self, handle: &Self::Handle);
}

/// Scoped ownership of a [`DisplayBackend`] resource.
///
/// The resource is released when the guard is dropped, or explicitly with
/// [`DisplayGuard::release`].
#[must_use = "the display resource is released as soon as the guard is dropped"]
pub struct DisplayGuard<'b, B: DisplayBackend> {
    backend: &'b B,
    handle: B::Handle,
}

impl<B: DisplayBackend> DisplayGuard<'_, B> {
    /// The acquired resource.
    pub fn handle(&self) -> &B::Handle {
        &self.handle
    }

    /// Releases the resource.
    pub fn release(self) {
        drop(self);
    }
}

impl<B: DisplayBackend> Drop for DisplayGuard<'_, B> {
    fn drop(&mut self) {
        self.backend.release(&self.handle);
    }
}

/// A `data:` URI for a displayed image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    id: u64,
    uri: String,
}

impl DataUri {
    /// The URI, e.g. `data:image/png;base64,...`.
    pub fn as_str(&self) -> &str {
        &self.uri
    }
}

/// In-memory [`DisplayBackend`] handing out `data:` URIs, which also counts unreleased handles.
#[derive(Debug, Default)]
pub struct DataUriBackend {
    next_id: AtomicU64,
    live: AtomicUsize,
}

impl DataUriBackend {
    /// Creates a backend with no live handles.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handles acquired and not yet released.
    pub fn live_handles(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl DisplayBackend for DataUriBackend {
    type Handle = DataUri;

    fn acquire(&self, image: &[u8], mime_type: &str) -> Result<DataUri> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);

        Ok(DataUri {
            id,
            uri: format!("data:{mime_type};base64,{}", base64_encode(image)),
        })
    }

    fn release(&self, handle: &DataUri) {
        tracing::trace!(id = handle.id, "released data URI");
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}
