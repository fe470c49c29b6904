//! Denso map lookup table record decoding.
//!
//! Each entry of the lookup table describes one calibration map: a leading
//! type byte selects a 16-byte 2D layout or a 20-byte 3D layout, and also
//! encodes the element width of each axis. Fields are big-endian.
//!
//! The module follows the same layering as the rest of the crate:
//! - `layout`: byte offsets and ranges (source of truth)
//! - `reader`: bounds-checked reads over a record window
//! - `parser`: classification, decoding and the plausibility predicate
//! - `error`: explicit decoding errors
//!
//! Decoding is pure and side-effect free; callers own the image buffer.

pub mod error;
pub mod layout;
pub mod parser;
pub mod reader;

pub use error::MapInfoError;
pub use parser::{
    ElementWidth, Map2d, Map3d, MapInfo, MapKind, classify, decode, is_plausible, record_size,
};
