use super::error::MapInfoError;

pub struct MapInfoReader<'a> {
    window: &'a [u8],
}

impl<'a> MapInfoReader<'a> {
    pub fn new(window: &'a [u8]) -> Self {
        Self { window }
    }

    /// Records are fixed-size: the window must match the kind's size exactly.
    pub fn require_exact_len(&self, expected: usize) -> Result<(), MapInfoError> {
        if self.window.len() != expected {
            return Err(MapInfoError::MalformedRecord {
                expected,
                actual: self.window.len(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8, MapInfoError> {
        self.window
            .get(offset)
            .copied()
            .ok_or(MapInfoError::MalformedRecord {
                expected: offset + 1,
                actual: self.window.len(),
            })
    }

    pub fn read_u32_be(&self, range: std::ops::Range<usize>) -> Result<u32, MapInfoError> {
        let bytes = self.read_slice(range)?;
        let bytes: [u8; 4] = bytes.try_into().map_err(|_| MapInfoError::MalformedRecord {
            expected: 4,
            actual: bytes.len(),
        })?;
        Ok(u32::from_be_bytes(bytes))
    }

    pub fn read_slice(&self, range: std::ops::Range<usize>) -> Result<&'a [u8], MapInfoError> {
        self.window
            .get(range.clone())
            .ok_or(MapInfoError::MalformedRecord {
                expected: range.end,
                actual: self.window.len(),
            })
    }
}
