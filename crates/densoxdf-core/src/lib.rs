//! Denso SuperH/M32R map lookup table decoder.
//!
//! Denso ECU firmware images embed a table of fixed-size records, each
//! describing where one calibration map (its axes and values) lives in the
//! image and how wide its elements are. This crate finds that table and
//! decodes it:
//! - `mapinfo`: record layout, decoding and the plausibility predicate
//! - `locator`: heuristic discovery of the table start
//! - `table`: sequential decoding from a known or discovered start
//! - `xdf`: TunerPro XDF rendering of the decoded table
//!
//! Everything here is pure and operates on a borrowed image buffer; reading
//! and writing files is left to the caller.
//!
//! Invariants:
//! - Record kinds are 2D (type byte `0x00..=0x0f`, 16 bytes) or 3D
//!   (`0x10..=0x2a`, 20 bytes); higher type bytes end the table.
//! - A table start is only accepted after a run of contiguous plausible
//!   records (5 by default) at a 4-byte aligned offset.
//!
//! # Examples
//! ```no_run
//! use densoxdf_core::{LocatorConfig, read_map_table, render_xdf};
//!
//! let image = std::fs::read("ecu.bin")?;
//! let table = read_map_table(&image, None, &LocatorConfig::default())?;
//! let xdf = render_xdf(&table, "2025-01-01 00:00:00")?;
//! println!("{} maps at {:#x}, {} bytes of XDF", table.maps.len(), table.offset, xdf.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod locator;
mod mapinfo;
mod table;
mod xdf;

pub use locator::{
    DEFAULT_ALIGNMENT, DEFAULT_MIN_RUN, LocateError, LocatorConfig, ScanState,
    find_lookup_table_offset, find_lookup_table_offset_with, probe,
};
pub use mapinfo::{
    ElementWidth, Map2d, Map3d, MapInfo, MapInfoError, MapKind, classify, decode, is_plausible,
    record_size,
};
pub use table::{MapTable, OffsetOrigin, TableError, decode_table, read_map_table};
pub use xdf::{UTF16_LE_BOM, XDF_VERSION, encode_utf16, format_timestamp, render_xdf, write_xdf};
