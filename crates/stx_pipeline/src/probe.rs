//! Image header probing.

use crate::error::ProbeError;
use crate::model::Dimensions;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

const DDS_MAGIC: [u8; 4] = *b"DDS ";
const DDS_HEADER_SIZE: u32 = 124;
/// Magic plus `DDS_HEADER`.
pub const DDS_PREAMBLE_LEN: usize = 4 + DDS_HEADER_SIZE as usize;

/// Reads the pixel dimensions of an asset without decoding it.
pub trait HeaderProber: Send + Sync {
    /// Implementations must not consume more than the header region.
    fn probe(&self, stream: &mut dyn Read) -> Result<Dimensions, ProbeError>;
}

/// Probes DirectDraw Surface headers.
///
/// Layout of the preamble (little endian):
///
/// | offset | field        |
/// |--------|--------------|
/// | 0      | `"DDS "`     |
/// | 4      | header size  |
/// | 8      | flags        |
/// | 12     | height       |
/// | 16     | width        |
#[derive(Debug, Clone, Copy, Default)]
pub struct DdsHeaderProber;

impl HeaderProber for DdsHeaderProber {
    fn probe(&self, stream: &mut dyn Read) -> Result<Dimensions, ProbeError> {
        let mut preamble = [0u8; DDS_PREAMBLE_LEN];
        stream.read_exact(&mut preamble)?;

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&preamble[..4]);
        if magic != DDS_MAGIC {
            return Err(ProbeError::BadMagic(magic));
        }

        let mut cursor = Cursor::new(&preamble[4..]);
        let size = cursor.read_u32::<LittleEndian>()?;
        if size != DDS_HEADER_SIZE {
            return Err(ProbeError::BadHeaderSize(size));
        }
        let _flags = cursor.read_u32::<LittleEndian>()?;
        let height = cursor.read_u32::<LittleEndian>()?;
        let width = cursor.read_u32::<LittleEndian>()?;

        if width == 0 || height == 0 {
            return Err(ProbeError::InvalidDimensions { width, height });
        }

        Ok(Dimensions::new(width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::dds_header;

    #[test]
    fn test_probe_reads_dimensions() {
        let bytes = dds_header(2048, 1024);
        let dims = DdsHeaderProber.probe(&mut bytes.as_slice()).unwrap();
        assert_eq!(dims, Dimensions::new(2048, 1024));
    }

    #[test]
    fn test_probe_stops_after_header() {
        let mut bytes = dds_header(64, 64);
        bytes.extend_from_slice(&[0xAB; 32]);

        let mut cursor = Cursor::new(bytes);
        DdsHeaderProber.probe(&mut cursor).unwrap();
        assert_eq!(cursor.position(), DDS_PREAMBLE_LEN as u64);
    }

    #[test]
    fn test_probe_bad_magic() {
        let mut bytes = dds_header(64, 64);
        bytes[..4].copy_from_slice(b"PNG!");

        let result = DdsHeaderProber.probe(&mut bytes.as_slice());
        assert!(matches!(result, Err(ProbeError::BadMagic(_))));
    }

    #[test]
    fn test_probe_bad_header_size() {
        let mut bytes = dds_header(64, 64);
        bytes[4] = 100;

        let result = DdsHeaderProber.probe(&mut bytes.as_slice());
        assert!(matches!(result, Err(ProbeError::BadHeaderSize(100))));
    }

    #[test]
    fn test_probe_truncated() {
        let bytes = dds_header(64, 64);
        let result = DdsHeaderProber.probe(&mut &bytes[..40]);
        assert!(matches!(result, Err(ProbeError::Io(_))));
    }

    #[test]
    fn test_probe_zero_dimensions() {
        let bytes = dds_header(0, 64);
        let result = DdsHeaderProber.probe(&mut bytes.as_slice());
        assert!(matches!(
            result,
            Err(ProbeError::InvalidDimensions { width: 0, height: 64 })
        ));
    }
}
