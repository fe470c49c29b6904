pub const TYPE_ID_OFFSET: usize = 0;
pub const X_LENGTH_OFFSET: usize = 1;
pub const Y_LENGTH_OFFSET: usize = 2;
pub const PADDING_OFFSET: usize = 3;

pub const X_ADDRESS_RANGE_2D: std::ops::Range<usize> = 4..8;
pub const Z_ADDRESS_RANGE_2D: std::ops::Range<usize> = 8..12;
pub const TRAILER_RANGE_2D: std::ops::Range<usize> = 12..16;
pub const RECORD_SIZE_2D: usize = 16;

pub const X_ADDRESS_RANGE_3D: std::ops::Range<usize> = 4..8;
pub const Y_ADDRESS_RANGE_3D: std::ops::Range<usize> = 8..12;
pub const Z_ADDRESS_RANGE_3D: std::ops::Range<usize> = 12..16;
pub const TRAILER_RANGE_3D: std::ops::Range<usize> = 16..20;
pub const RECORD_SIZE_3D: usize = 20;

/// Highest type byte describing a 2D map.
pub const MAX_TYPE_ID_2D: u8 = 0x0f;
/// Highest type byte describing any map.
pub const MAX_TYPE_ID: u8 = 0x2a;

/// Padding byte at `PADDING_OFFSET`; the value depends on the firmware version.
pub const PADDING_VALUES: [u8; 2] = [0x00, 0xff];

/// Type byte bits selecting 8-bit elements (cleared means 16-bit).
pub const X_WIDTH_8BIT_MASK: u8 = 1 << 4;
pub const Y_WIDTH_8BIT_MASK: u8 = 1 << 2;
pub const Z_WIDTH_8BIT_MASK: u8 = 1 << 0;
