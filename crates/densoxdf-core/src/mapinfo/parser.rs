use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use super::error::MapInfoError;
use super::layout;
use super::reader::MapInfoReader;

/// Map dimensionality, selected by the leading type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MapKind {
    #[serde(rename = "2d")]
    TwoD,
    #[serde(rename = "3d")]
    ThreeD,
}

impl MapKind {
    pub fn record_size(self) -> usize {
        match self {
            MapKind::TwoD => layout::RECORD_SIZE_2D,
            MapKind::ThreeD => layout::RECORD_SIZE_3D,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MapKind::TwoD => "2D",
            MapKind::ThreeD => "3D",
        }
    }

    fn trailer_range(self) -> std::ops::Range<usize> {
        match self {
            MapKind::TwoD => layout::TRAILER_RANGE_2D,
            MapKind::ThreeD => layout::TRAILER_RANGE_3D,
        }
    }
}

/// Width of one axis or value element in the firmware image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementWidth {
    Bits8,
    Bits16,
}

impl ElementWidth {
    fn from_type_id(type_id: u8, mask: u8) -> Self {
        if type_id & mask != 0 {
            ElementWidth::Bits8
        } else {
            ElementWidth::Bits16
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            ElementWidth::Bits8 => 8,
            ElementWidth::Bits16 => 16,
        }
    }
}

impl Serialize for ElementWidth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.bits())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Map2d {
    pub type_id: u8,
    pub x_length: u8,
    pub x_address: u32,
    pub z_address: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Map3d {
    pub type_id: u8,
    pub x_length: u8,
    pub y_length: u8,
    pub x_address: u32,
    pub y_address: u32,
    pub z_address: u32,
}

/// One decoded lookup table entry.
///
/// # Examples
/// ```
/// use densoxdf_core::MapKind;
///
/// let bytes = [
///     0x09, 0x1d, 0xff, 0xff, 0x00, 0x06, 0x07, 0x04,
///     0x00, 0x06, 0x08, 0xa6, 0x00, 0x00, 0x00, 0x00,
/// ];
/// let map = densoxdf_core::decode(&bytes)?;
/// assert_eq!(map.kind(), MapKind::TwoD);
/// assert_eq!(map.x_length(), 29);
/// assert_eq!(map.y_address(), None);
/// # Ok::<(), densoxdf_core::MapInfoError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapInfo {
    TwoD(Map2d),
    ThreeD(Map3d),
}

/// Flat record form tagged with `kind`, including the element widths
/// implied by the type byte. The y fields only appear for 3D maps.
impl Serialize for MapInfo {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = match self {
            MapInfo::TwoD(_) => 7,
            MapInfo::ThreeD(_) => 10,
        };
        let mut state = serializer.serialize_struct("MapInfo", fields)?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("type_id", &self.type_id())?;
        state.serialize_field("x_length", &self.x_length())?;
        if let MapInfo::ThreeD(map) = self {
            state.serialize_field("y_length", &map.y_length)?;
        }
        state.serialize_field("x_address", &self.x_address())?;
        if let MapInfo::ThreeD(map) = self {
            state.serialize_field("y_address", &map.y_address)?;
        }
        state.serialize_field("z_address", &self.z_address())?;
        state.serialize_field("x_element_bits", &self.x_width())?;
        if let Some(width) = self.y_width() {
            state.serialize_field("y_element_bits", &width)?;
        }
        state.serialize_field("z_element_bits", &self.z_width())?;
        state.end()
    }
}

impl MapInfo {
    pub fn kind(&self) -> MapKind {
        match self {
            MapInfo::TwoD(_) => MapKind::TwoD,
            MapInfo::ThreeD(_) => MapKind::ThreeD,
        }
    }

    pub fn size(&self) -> usize {
        self.kind().record_size()
    }

    pub fn type_id(&self) -> u8 {
        match self {
            MapInfo::TwoD(map) => map.type_id,
            MapInfo::ThreeD(map) => map.type_id,
        }
    }

    pub fn x_length(&self) -> u8 {
        match self {
            MapInfo::TwoD(map) => map.x_length,
            MapInfo::ThreeD(map) => map.x_length,
        }
    }

    pub fn y_length(&self) -> Option<u8> {
        match self {
            MapInfo::TwoD(_) => None,
            MapInfo::ThreeD(map) => Some(map.y_length),
        }
    }

    pub fn x_address(&self) -> u32 {
        match self {
            MapInfo::TwoD(map) => map.x_address,
            MapInfo::ThreeD(map) => map.x_address,
        }
    }

    pub fn y_address(&self) -> Option<u32> {
        match self {
            MapInfo::TwoD(_) => None,
            MapInfo::ThreeD(map) => Some(map.y_address),
        }
    }

    pub fn z_address(&self) -> u32 {
        match self {
            MapInfo::TwoD(map) => map.z_address,
            MapInfo::ThreeD(map) => map.z_address,
        }
    }

    pub fn x_width(&self) -> ElementWidth {
        ElementWidth::from_type_id(self.type_id(), layout::X_WIDTH_8BIT_MASK)
    }

    /// Only 3D maps carry a y axis.
    pub fn y_width(&self) -> Option<ElementWidth> {
        match self {
            MapInfo::TwoD(_) => None,
            MapInfo::ThreeD(map) => Some(ElementWidth::from_type_id(
                map.type_id,
                layout::Y_WIDTH_8BIT_MASK,
            )),
        }
    }

    pub fn z_width(&self) -> ElementWidth {
        ElementWidth::from_type_id(self.type_id(), layout::Z_WIDTH_8BIT_MASK)
    }

    /// Every populated address, in x, y, z order.
    pub fn addresses(&self) -> impl Iterator<Item = u32> {
        [Some(self.x_address()), self.y_address(), Some(self.z_address())]
            .into_iter()
            .flatten()
    }
}

/// Map the leading type byte to a record kind.
///
/// # Errors
/// Returns `MapInfoError::UnrecognizedType` for bytes above `0x2a`.
pub fn classify(type_id: u8) -> Result<MapKind, MapInfoError> {
    if type_id > layout::MAX_TYPE_ID {
        Err(MapInfoError::UnrecognizedType { type_id })
    } else if type_id > layout::MAX_TYPE_ID_2D {
        Ok(MapKind::ThreeD)
    } else {
        Ok(MapKind::TwoD)
    }
}

pub fn record_size(kind: MapKind) -> usize {
    kind.record_size()
}

/// Decode a record window whose length matches the kind of its first byte.
///
/// # Errors
/// Returns `UnrecognizedType` for an invalid leading byte and
/// `MalformedRecord` when the window is empty or not exactly one record long.
pub fn decode(bytes: &[u8]) -> Result<MapInfo, MapInfoError> {
    let reader = MapInfoReader::new(bytes);
    let type_id = reader.read_u8(layout::TYPE_ID_OFFSET)?;
    let kind = classify(type_id)?;
    reader.require_exact_len(kind.record_size())?;

    let x_length = reader.read_u8(layout::X_LENGTH_OFFSET)?;
    let map = match kind {
        MapKind::TwoD => MapInfo::TwoD(Map2d {
            type_id,
            x_length,
            x_address: reader.read_u32_be(layout::X_ADDRESS_RANGE_2D)?,
            z_address: reader.read_u32_be(layout::Z_ADDRESS_RANGE_2D)?,
        }),
        MapKind::ThreeD => MapInfo::ThreeD(Map3d {
            type_id,
            x_length,
            y_length: reader.read_u8(layout::Y_LENGTH_OFFSET)?,
            x_address: reader.read_u32_be(layout::X_ADDRESS_RANGE_3D)?,
            y_address: reader.read_u32_be(layout::Y_ADDRESS_RANGE_3D)?,
            z_address: reader.read_u32_be(layout::Z_ADDRESS_RANGE_3D)?,
        }),
    };
    Ok(map)
}

/// Heuristic check that a window looks like a genuine record.
///
/// Decodable garbage is common, so the few structural constants are checked
/// as well: the padding byte, the zero trailer, and every address pointing
/// inside an image of `image_size` bytes. Never fails; any violation is `false`.
pub fn is_plausible(bytes: &[u8], image_size: usize) -> bool {
    let Ok(map) = decode(bytes) else {
        return false;
    };
    let reader = MapInfoReader::new(bytes);

    match reader.read_u8(layout::PADDING_OFFSET) {
        Ok(padding) if layout::PADDING_VALUES.contains(&padding) => {}
        _ => return false,
    }
    match reader.read_slice(map.kind().trailer_range()) {
        Ok(trailer) if trailer.iter().all(|&b| b == 0) => {}
        _ => return false,
    }

    map.addresses()
        .all(|address| address != 0 && (address as usize) < image_size)
}
