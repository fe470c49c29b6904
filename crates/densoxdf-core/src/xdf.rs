//! TunerPro XDF rendering.
//!
//! Each decoded record becomes one `XDFTABLE` whose axes point at the
//! embedded axis and value data in the image. Only location, shape and
//! element width are known; every map is emitted with an identity equation.

use std::fmt::{self, Write};

use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use crate::mapinfo::{ElementWidth, MapInfo};
use crate::table::MapTable;

pub const XDF_VERSION: &str = "1.70";
/// Byte order mark written ahead of the UTF-16LE document.
pub const UTF16_LE_BOM: [u8; 2] = [0xff, 0xfe];

const GENERATOR: &str = "densoxdf Denso SuperH XDF generator";
const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Format the generation time embedded in the XDF header comment.
///
/// # Examples
/// ```
/// use time::macros::datetime;
///
/// let at = datetime!(2025-04-17 23:31:06 UTC);
/// assert_eq!(densoxdf_core::format_timestamp(at)?, "2025-04-17 23:31:06");
/// # Ok::<(), time::error::Format>(())
/// ```
pub fn format_timestamp(at: OffsetDateTime) -> Result<String, time::error::Format> {
    at.format(TIMESTAMP_FORMAT)
}

/// Render the XDF document for `table`.
///
/// # Errors
/// Propagates any `fmt::Error` from [`write_xdf`].
pub fn render_xdf(table: &MapTable, generated_at: &str) -> Result<String, fmt::Error> {
    let mut out = String::new();
    write_xdf(&mut out, table, generated_at)?;
    Ok(out)
}

/// Encode a document as UTF-16LE with a leading byte order mark.
pub fn encode_utf16(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(UTF16_LE_BOM.len() + text.len() * 2);
    bytes.extend_from_slice(&UTF16_LE_BOM);
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    bytes
}

pub fn write_xdf<W: Write>(out: &mut W, table: &MapTable, generated_at: &str) -> fmt::Result {
    writeln!(out, "<!-- Written on {generated_at} by {GENERATOR} -->")?;
    writeln!(out, "<XDFFORMAT version=\"{XDF_VERSION}\">")?;
    writeln!(out, "    <XDFHEADER>")?;
    writeln!(out, "        <flags>0x1</flags>")?;
    writeln!(out, "        <description>Autogenerated by {GENERATOR}</description>")?;
    writeln!(out, "        <BASEOFFSET offset=\"0\" subtract=\"0\" />")?;
    writeln!(
        out,
        "        <DEFAULTS datasizeinbits=\"8\" sigdigits=\"2\" outputtype=\"1\" signed=\"0\" lsbfirst=\"0\" float=\"0\" />"
    )?;
    writeln!(
        out,
        "        <REGION type=\"0xFFFFFFFF\" startaddress=\"0x0\" size=\"{:#x}\" regionflags=\"0x0\" name=\"Binary File\" desc=\"This region describes the bin file edited by this XDF\" />",
        table.image_bytes
    )?;
    writeln!(out, "    </XDFHEADER>")?;

    for (index, map) in table.maps.iter().enumerate() {
        write_table(out, index + 1, map)?;
    }

    writeln!(out, "</XDFFORMAT>")
}

fn write_table<W: Write>(out: &mut W, unique_id: usize, map: &MapInfo) -> fmt::Result {
    writeln!(out, "    <XDFTABLE uniqueid=\"{unique_id:#x}\" flags=\"0x0\">")?;
    match map {
        MapInfo::TwoD(map2d) => {
            writeln!(
                out,
                "        <title>2D map x{} at {:#x}</title>",
                map2d.x_length, map2d.z_address
            )?;
            write_embedded_axis(out, "x", map2d.x_address, map.x_width(), map2d.x_length)?;
            write_single_row_axis(out)?;
        }
        MapInfo::ThreeD(map3d) => {
            writeln!(
                out,
                "        <title>3D map x{}y{} at {:#x}</title>",
                map3d.x_length, map3d.y_length, map3d.z_address
            )?;
            write_embedded_axis(out, "x", map3d.x_address, map.x_width(), map3d.x_length)?;
            let y_width = map.y_width().unwrap_or(ElementWidth::Bits16);
            write_embedded_axis(out, "y", map3d.y_address, y_width, map3d.y_length)?;
        }
    }
    write_values(out, map)?;
    writeln!(out, "    </XDFTABLE>")
}

fn write_embedded_axis<W: Write>(
    out: &mut W,
    id: &str,
    address: u32,
    width: ElementWidth,
    count: u8,
) -> fmt::Result {
    let bits = width.bits();
    writeln!(out, "        <XDFAXIS id=\"{id}\" uniqueid=\"0x0\">")?;
    writeln!(
        out,
        "            <EMBEDDEDDATA mmedaddress=\"{address:#x}\" mmedelementsizebits=\"{bits}\" mmedcolcount=\"{count}\" mmedmajorstridebits=\"{bits}\" mmedminorstridebits=\"0\" />"
    )?;
    writeln!(out, "            <indexcount>{count}</indexcount>")?;
    writeln!(out, "            <embedinfo type=\"1\" />")?;
    writeln!(out, "            <datatype>0</datatype>")?;
    writeln!(out, "            <unittype>0</unittype>")?;
    writeln!(out, "            <DALINK index=\"0\" />")?;
    write_identity_math(out)?;
    writeln!(out, "        </XDFAXIS>")
}

/// A 2D map still needs a y axis; it has a single unlabeled row.
fn write_single_row_axis<W: Write>(out: &mut W) -> fmt::Result {
    writeln!(out, "        <XDFAXIS id=\"y\" uniqueid=\"0x0\">")?;
    writeln!(
        out,
        "            <EMBEDDEDDATA mmedelementsizebits=\"8\" mmedmajorstridebits=\"-32\" mmedminorstridebits=\"0\" />"
    )?;
    writeln!(out, "            <indexcount>1</indexcount>")?;
    writeln!(out, "            <embedinfo type=\"1\" />")?;
    writeln!(out, "            <datatype>0</datatype>")?;
    writeln!(out, "            <unittype>0</unittype>")?;
    writeln!(out, "            <DALINK index=\"0\" />")?;
    writeln!(out, "            <LABEL index=\"0\" value=\"0.00\" />")?;
    write_identity_math(out)?;
    writeln!(out, "        </XDFAXIS>")
}

fn write_values<W: Write>(out: &mut W, map: &MapInfo) -> fmt::Result {
    let rows = map.y_length().unwrap_or(1);
    writeln!(out, "        <XDFAXIS id=\"z\">")?;
    writeln!(
        out,
        "            <EMBEDDEDDATA mmedaddress=\"{:#x}\" mmedelementsizebits=\"{}\" mmedrowcount=\"{}\" mmedcolcount=\"{}\" mmedmajorstridebits=\"0\" />",
        map.z_address(),
        map.z_width().bits(),
        rows,
        map.x_length()
    )?;
    writeln!(out, "            <decimalpl>2</decimalpl>")?;
    writeln!(out, "            <min>0.000000</min>")?;
    writeln!(out, "            <max>5000.000000</max>")?;
    writeln!(out, "            <outputtype>2</outputtype>")?;
    write_identity_math(out)?;
    writeln!(out, "        </XDFAXIS>")
}

fn write_identity_math<W: Write>(out: &mut W) -> fmt::Result {
    writeln!(out, "            <MATH equation=\"X\">")?;
    writeln!(out, "                <VAR id=\"X\" />")?;
    writeln!(out, "            </MATH>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapinfo::{Map2d, Map3d};
    use crate::table::OffsetOrigin;
    use time::macros::datetime;

    fn sample_table() -> MapTable {
        MapTable {
            offset: 0x2c000,
            origin: OffsetOrigin::Discovered,
            image_bytes: 0x10_0000,
            maps: vec![
                MapInfo::TwoD(Map2d {
                    type_id: 0x09,
                    x_length: 29,
                    x_address: 0x60704,
                    z_address: 0x608a6,
                }),
                MapInfo::ThreeD(Map3d {
                    type_id: 0x29,
                    x_length: 6,
                    y_length: 25,
                    x_address: 0x80000,
                    y_address: 0x8000c,
                    z_address: 0x80348,
                }),
            ],
        }
    }

    #[test]
    fn header_describes_image_region() {
        let xdf = render_xdf(&sample_table(), "2025-04-17 23:31:06").unwrap();
        assert!(xdf.starts_with("<!-- Written on 2025-04-17 23:31:06 by "));
        assert!(xdf.contains("<XDFFORMAT version=\"1.70\">"));
        assert!(xdf.contains("startaddress=\"0x0\" size=\"0x100000\""));
        assert!(xdf.trim_end().ends_with("</XDFFORMAT>"));
    }

    #[test]
    fn one_table_per_map_with_sequential_ids() {
        let xdf = render_xdf(&sample_table(), "now").unwrap();
        assert_eq!(xdf.matches("<XDFTABLE ").count(), 2);
        assert_eq!(xdf.matches("</XDFTABLE>").count(), 2);
        assert!(xdf.contains("<XDFTABLE uniqueid=\"0x1\" flags=\"0x0\">"));
        assert!(xdf.contains("<XDFTABLE uniqueid=\"0x2\" flags=\"0x0\">"));
    }

    #[test]
    fn two_d_map_has_single_row() {
        let xdf = render_xdf(&sample_table(), "now").unwrap();
        assert!(xdf.contains("<title>2D map x29 at 0x608a6</title>"));
        assert!(xdf.contains(
            "<EMBEDDEDDATA mmedaddress=\"0x60704\" mmedelementsizebits=\"16\" mmedcolcount=\"29\" mmedmajorstridebits=\"16\" mmedminorstridebits=\"0\" />"
        ));
        assert!(xdf.contains("<LABEL index=\"0\" value=\"0.00\" />"));
        assert!(xdf.contains(
            "<EMBEDDEDDATA mmedaddress=\"0x608a6\" mmedelementsizebits=\"8\" mmedrowcount=\"1\" mmedcolcount=\"29\" mmedmajorstridebits=\"0\" />"
        ));
    }

    #[test]
    fn three_d_map_has_both_axes() {
        let xdf = render_xdf(&sample_table(), "now").unwrap();
        assert!(xdf.contains("<title>3D map x6y25 at 0x80348</title>"));
        assert!(xdf.contains("mmedaddress=\"0x8000c\" mmedelementsizebits=\"16\" mmedcolcount=\"25\""));
        assert!(xdf.contains(
            "<EMBEDDEDDATA mmedaddress=\"0x80348\" mmedelementsizebits=\"8\" mmedrowcount=\"25\" mmedcolcount=\"6\" mmedmajorstridebits=\"0\" />"
        ));
    }

    #[test]
    fn render_matches_streamed_output() {
        let table = sample_table();
        let mut streamed = String::new();
        write_xdf(&mut streamed, &table, "now").unwrap();
        assert_eq!(render_xdf(&table, "now"), Ok(streamed));
    }

    #[test]
    fn empty_table_renders_header_only() {
        let mut table = sample_table();
        table.maps.clear();
        let xdf = render_xdf(&table, "now").unwrap();
        assert!(!xdf.contains("<XDFTABLE"));
        assert!(xdf.contains("</XDFHEADER>\n</XDFFORMAT>"));
    }

    #[test]
    fn utf16_output_has_bom_and_little_endian_units() {
        let bytes = encode_utf16("<X");
        assert_eq!(bytes, vec![0xff, 0xfe, b'<', 0x00, b'X', 0x00]);
    }

    #[test]
    fn timestamp_is_second_precision() {
        let at = datetime!(2025-04-17 23:31:06.75 UTC);
        assert_eq!(format_timestamp(at).unwrap(), "2025-04-17 23:31:06");
    }
}
