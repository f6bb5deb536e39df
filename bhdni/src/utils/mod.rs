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

pub(crate) mod base64;
pub(crate) mod date;
pub(crate) mod digest;

use crate::{DniError, Result};

/// Returns `length` bytes of `data` starting at `offset`, or a
/// [`DniError::TruncatedPayload`] error if the range does not fit.
pub(crate) fn read_bytes(data: &[u8], offset: usize, length: usize) -> Result<&[u8]> {
    offset
        .checked_add(length)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| {
            bherror::Error::root(DniError::TruncatedPayload).ctx(format!(
                "reading {length} bytes at offset {offset} of a {} byte payload",
                data.len()
            ))
        })
}

/// Returns the byte of `data` at `offset`, or a [`DniError::TruncatedPayload`] error.
pub(crate) fn read_byte(data: &[u8], offset: usize) -> Result<u8> {
    read_bytes(data, offset, 1).map(|bytes| bytes[0])
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_read_bytes() {
        let data = [1u8, 2, 3, 4];

        assert_eq!(read_bytes(&data, 1, 2).unwrap(), [2, 3]);
        assert_eq!(read_bytes(&data, 4, 0).unwrap(), [0u8; 0]);
        assert_eq!(read_byte(&data, 3).unwrap(), 4);
    }

    #[test]
    fn test_read_bytes_out_of_bounds() {
        let data = [1u8, 2, 3, 4];

        assert_matches!(
            read_bytes(&data, 3, 2).unwrap_err().error,
            DniError::TruncatedPayload
        );
        assert_matches!(
            read_bytes(&data, usize::MAX, 2).unwrap_err().error,
            DniError::TruncatedPayload
        );
        assert_matches!(read_byte(&data, 4).unwrap_err().error, DniError::TruncatedPayload);
    }
}
