//! Sequential decoding of the lookup table.
//!
//! Starting at the table offset, records are decoded back to back until a
//! type byte falls outside the map type range, which marks the end of the
//! table. The offset is either supplied by the caller or discovered by the
//! locator.

use serde::Serialize;
use thiserror::Error;

use crate::locator::{LocateError, LocatorConfig, find_lookup_table_offset_with};
use crate::mapinfo::{MapInfo, MapInfoError, MapKind, classify, decode};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error(transparent)]
    Locate(#[from] LocateError),
    #[error("table offset {offset:#x} is outside the image ({len:#x} bytes)")]
    OffsetOutOfRange { offset: usize, len: usize },
    #[error("invalid map record at {offset:#x}: {source}")]
    Record {
        offset: usize,
        #[source]
        source: MapInfoError,
    },
}

/// How the table offset was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetOrigin {
    Explicit,
    Discovered,
}

/// Decoded lookup table with its location in the image.
///
/// # Examples
/// ```
/// use densoxdf_core::{LocatorConfig, MapKind, read_map_table};
///
/// let record = [
///     0x09, 0x1d, 0xff, 0xff, 0x00, 0x00, 0x00, 0x40,
///     0x00, 0x00, 0x00, 0x44, 0x00, 0x00, 0x00, 0x00,
/// ];
/// let mut image = record.to_vec();
/// image.extend_from_slice(&[0xff; 0x40]);
///
/// let table = read_map_table(&image, Some(0), &LocatorConfig::default())?;
/// assert_eq!(table.maps.len(), 1);
/// assert_eq!(table.count(MapKind::TwoD), 1);
/// # Ok::<(), densoxdf_core::TableError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MapTable {
    /// Byte offset of the first record.
    pub offset: usize,
    pub origin: OffsetOrigin,
    /// Size of the whole firmware image in bytes.
    pub image_bytes: usize,
    /// Records in table order.
    pub maps: Vec<MapInfo>,
}

impl MapTable {
    pub fn count(&self, kind: MapKind) -> usize {
        self.maps.iter().filter(|map| map.kind() == kind).count()
    }
}

/// Decode records from `offset` until the table ends.
///
/// The table ends at the first unrecognized type byte or at the end of the
/// image. An unrecognized type byte at `offset` itself is an error, since
/// nothing was decoded.
///
/// # Errors
/// Returns `OffsetOutOfRange` when `offset` is not inside the image and
/// `Record` when the first record is unrecognized or a record is truncated
/// by the end of the image.
pub fn decode_table(image: &[u8], offset: usize) -> Result<Vec<MapInfo>, TableError> {
    if offset >= image.len() {
        return Err(TableError::OffsetOutOfRange {
            offset,
            len: image.len(),
        });
    }

    let mut maps = Vec::new();
    let mut position = offset;
    while let Some(&type_id) = image.get(position) {
        let kind = match classify(type_id) {
            Ok(kind) => kind,
            Err(source) if position == offset => {
                return Err(TableError::Record {
                    offset: position,
                    source,
                });
            }
            Err(_) => break,
        };
        let end = position.saturating_add(kind.record_size()).min(image.len());
        let map = decode(&image[position..end]).map_err(|source| TableError::Record {
            offset: position,
            source,
        })?;
        maps.push(map);
        position += kind.record_size();
    }

    Ok(maps)
}

/// Locate (unless `explicit_offset` is given) and decode the lookup table.
///
/// # Errors
/// Returns `TableError::Locate` when no offset was given and none could be
/// discovered, otherwise any error from [`decode_table`].
pub fn read_map_table(
    image: &[u8],
    explicit_offset: Option<usize>,
    config: &LocatorConfig,
) -> Result<MapTable, TableError> {
    let (offset, origin) = match explicit_offset {
        Some(offset) => (offset, OffsetOrigin::Explicit),
        None => (
            find_lookup_table_offset_with(image, config)?,
            OffsetOrigin::Discovered,
        ),
    };
    let maps = decode_table(image, offset)?;
    Ok(MapTable {
        offset,
        origin,
        image_bytes: image.len(),
        maps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_2D: [u8; 16] = [
        0x09, 0x1d, 0xff, 0xff, 0x00, 0x00, 0x01, 0x23, 0x00, 0x00, 0x02, 0x34, 0x00, 0x00, 0x00,
        0x00,
    ];
    const SAMPLE_3D: [u8; 20] = [
        0x29, 0x06, 0x19, 0xff, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x0c, 0x00, 0x00, 0x03,
        0x48, 0x00, 0x00, 0x00, 0x00,
    ];

    fn table_image(prefix: usize) -> Vec<u8> {
        let mut image = vec![0xff; prefix];
        for _ in 0..3 {
            image.extend_from_slice(&SAMPLE_2D);
        }
        for _ in 0..2 {
            image.extend_from_slice(&SAMPLE_3D);
        }
        image.extend_from_slice(&[0xff; 0x400]);
        image
    }

    #[test]
    fn decode_stops_at_unrecognized_type() {
        let image = table_image(0x20);
        let maps = decode_table(&image, 0x20).unwrap();
        assert_eq!(maps.len(), 5);
        assert_eq!(maps[0].kind(), MapKind::TwoD);
        assert_eq!(maps[4].kind(), MapKind::ThreeD);
        assert_eq!(maps[4].y_address(), Some(0x10c));
    }

    #[test]
    fn decode_stops_at_image_end() {
        let mut image = SAMPLE_2D.to_vec();
        image.extend_from_slice(&SAMPLE_3D);
        let maps = decode_table(&image, 0).unwrap();
        assert_eq!(maps.len(), 2);
    }

    #[test]
    fn unrecognized_type_at_explicit_offset_is_fatal() {
        let image = table_image(0x20);
        let err = decode_table(&image, 0x10).unwrap_err();
        assert_eq!(
            err,
            TableError::Record {
                offset: 0x10,
                source: MapInfoError::UnrecognizedType { type_id: 0xff },
            }
        );
    }

    #[test]
    fn truncated_record_is_fatal() {
        let mut image = SAMPLE_2D.to_vec();
        image.extend_from_slice(&SAMPLE_3D[..12]);
        let err = decode_table(&image, 0).unwrap_err();
        assert_eq!(
            err,
            TableError::Record {
                offset: 16,
                source: MapInfoError::MalformedRecord {
                    expected: 20,
                    actual: 12
                },
            }
        );
    }

    #[test]
    fn offset_past_end_is_rejected() {
        let image = table_image(0);
        let err = decode_table(&image, image.len()).unwrap_err();
        assert!(matches!(err, TableError::OffsetOutOfRange { .. }));
        assert!(err.to_string().contains("outside the image"));
    }

    #[test]
    fn read_map_table_discovers_offset() {
        let image = table_image(0x40);
        let table = read_map_table(&image, None, &LocatorConfig::default()).unwrap();
        assert_eq!(table.offset, 0x40);
        assert_eq!(table.origin, OffsetOrigin::Discovered);
        assert_eq!(table.image_bytes, image.len());
        assert_eq!(table.count(MapKind::TwoD), 3);
        assert_eq!(table.count(MapKind::ThreeD), 2);
    }

    #[test]
    fn read_map_table_honors_explicit_offset() {
        let image = table_image(0x40);
        let table = read_map_table(&image, Some(0x50), &LocatorConfig::default()).unwrap();
        assert_eq!(table.origin, OffsetOrigin::Explicit);
        assert_eq!(table.maps.len(), 4);
    }

    #[test]
    fn read_map_table_reports_missing_table() {
        let image = vec![0xff; 0x200];
        let err = read_map_table(&image, None, &LocatorConfig::default()).unwrap_err();
        assert_eq!(err, TableError::Locate(LocateError::TableNotFound));
    }
}
