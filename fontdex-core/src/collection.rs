//! Packing preview subsets into one multi-font collection file.
//!
//! Append order is family-id order, never task-completion order, so the
//! container layout is identical across runs. For every packed font the
//! assembler re-reads the name table of the *subsetted* program — the
//! name a client must use to address the preview outlines, which can
//! differ from the catalog's family name once subsetting has shuffled
//! name records.

use std::collections::BTreeMap;

use anyhow::{anyhow, Context, Result};
use read_fonts::tables::name::NameId;
use read_fonts::{FontRef, TableProvider};

use crate::sfnt;

/// The assembled collection plus the id → advertised-name map the
/// catalog writer joins on.
#[derive(Debug, Default)]
pub struct PreviewCollection {
    pub bytes: Vec<u8>,
    pub families: BTreeMap<String, String>,
}

/// Pack the successfully subsetted fonts, keyed by family id, into a
/// TrueType Collection. An empty input still yields a valid (empty)
/// collection.
pub fn assemble(fonts: &BTreeMap<String, Vec<u8>>) -> Result<PreviewCollection> {
    let mut families = BTreeMap::new();

    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"ttcf");
    bytes.extend_from_slice(&1u16.to_be_bytes()); // major version
    bytes.extend_from_slice(&0u16.to_be_bytes()); // minor version
    bytes.extend_from_slice(&(fonts.len() as u32).to_be_bytes());

    // Reserve the per-font offset array; each slot is patched as its
    // font lands.
    let offsets_at = bytes.len();
    bytes.resize(bytes.len() + 4 * fonts.len(), 0);

    for (index, (id, data)) in fonts.iter().enumerate() {
        if let Some(name) = read_advertised_name(data) {
            families.insert(id.clone(), name);
        }

        let font_offset = bytes.len() as u32;
        sfnt::put_u32(&mut bytes, offsets_at + 4 * index, font_offset);
        append_font(&mut bytes, data).with_context(|| format!("packing preview font for {id}"))?;
    }

    Ok(PreviewCollection { bytes, families })
}

/// Append one single-font program: its original sfnt header, a table
/// directory rebased to absolute container offsets, then the table data
/// 4-byte aligned.
fn append_font(out: &mut Vec<u8>, data: &[u8]) -> Result<()> {
    let (_, records) = sfnt::parse_table_directory(data)?;

    let mut slices = Vec::with_capacity(records.len());
    for record in &records {
        slices.push((record.tag, sfnt::table_slice(data, record)?));
    }

    let header = data.get(..12).ok_or_else(|| anyhow!("font header too short"))?;
    out.extend_from_slice(header);

    let mut data_offset = out.len() + slices.len() * 16;
    for (tag, slice) in &slices {
        out.extend_from_slice(tag);
        out.extend_from_slice(&sfnt::checksum(slice).to_be_bytes());
        out.extend_from_slice(&(data_offset as u32).to_be_bytes());
        out.extend_from_slice(&(slice.len() as u32).to_be_bytes());
        data_offset += sfnt::padded_len(slice.len());
    }

    for (_, slice) in &slices {
        out.extend_from_slice(slice);
        while out.len() % 4 != 0 {
            out.push(0);
        }
    }

    Ok(())
}

/// Best name the subsetted program itself advertises: full name, else
/// typographic family, else family — Unicode records only.
fn read_advertised_name(data: &[u8]) -> Option<String> {
    let font = FontRef::new(data).ok()?;
    let name_table = font.name().ok()?;
    let strings = name_table.string_data();

    let mut family = None;
    let mut typographic = None;
    let mut full = None;

    for record in name_table.name_record() {
        if !record.is_unicode() {
            continue;
        }
        let Ok(entry) = record.string(strings) else {
            continue;
        };
        let rendered = entry.to_string();
        if rendered.trim().is_empty() {
            continue;
        }

        let id = record.name_id();
        if id == NameId::FULL_NAME && full.is_none() {
            full = Some(rendered);
        } else if id == NameId::TYPOGRAPHIC_FAMILY_NAME && typographic.is_none() {
            typographic = Some(rendered);
        } else if id == NameId::FAMILY_NAME && family.is_none() {
            family = Some(rendered);
        }
    }

    full.or(typographic)
        .or(family)
        .map(|name| name.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hand-built name table with a single Windows/Unicode full-name
    /// record.
    fn name_table(full_name: &str) -> Vec<u8> {
        let encoded: Vec<u8> = full_name.encode_utf16().flat_map(u16::to_be_bytes).collect();

        let mut out = Vec::new();
        out.extend_from_slice(&0u16.to_be_bytes()); // format
        out.extend_from_slice(&1u16.to_be_bytes()); // count
        out.extend_from_slice(&18u16.to_be_bytes()); // stringOffset: header + 1 record
        out.extend_from_slice(&3u16.to_be_bytes()); // platform: Windows
        out.extend_from_slice(&1u16.to_be_bytes()); // encoding: Unicode BMP
        out.extend_from_slice(&0x0409u16.to_be_bytes()); // language: en-US
        out.extend_from_slice(&4u16.to_be_bytes()); // name id: full name
        out.extend_from_slice(&(encoded.len() as u16).to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes()); // offset into string data
        out.extend_from_slice(&encoded);
        out
    }

    fn font_with_tables(tables: &[([u8; 4], Vec<u8>)]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0x0001_0000u32.to_be_bytes());
        out.extend_from_slice(&(tables.len() as u16).to_be_bytes());
        out.extend_from_slice(&[0u8; 6]); // search params, unused by parsers we care about

        let mut offset = 12 + tables.len() * 16;
        for (tag, data) in tables {
            out.extend_from_slice(tag);
            out.extend_from_slice(&sfnt::checksum(data).to_be_bytes());
            out.extend_from_slice(&(offset as u32).to_be_bytes());
            out.extend_from_slice(&(data.len() as u32).to_be_bytes());
            offset += sfnt::padded_len(data.len());
        }
        for (_, data) in tables {
            out.extend_from_slice(data);
            while out.len() % 4 != 0 {
                out.push(0);
            }
        }
        out
    }

    #[test]
    fn empty_input_yields_a_valid_empty_collection() {
        let collection = assemble(&BTreeMap::new()).expect("assemble");

        assert_eq!(&collection.bytes[0..4], b"ttcf");
        assert_eq!(sfnt::get_u32(&collection.bytes, 8).expect("numFonts"), 0);
        assert!(collection.families.is_empty());
    }

    #[test]
    fn packs_fonts_in_id_order_with_rebased_offsets() {
        let font_a = font_with_tables(&[(*b"aaaa", vec![1, 2, 3, 4, 5])]);
        let font_b = font_with_tables(&[(*b"bbbb", vec![9, 9, 9, 9])]);

        let mut fonts = BTreeMap::new();
        // Insertion order is deliberately reversed; BTreeMap keys give
        // the id ordering.
        fonts.insert("ofl/zeta".to_string(), font_a.clone());
        fonts.insert("apache/alpha".to_string(), font_b.clone());

        let collection = assemble(&fonts).expect("assemble");
        let bytes = &collection.bytes;

        assert_eq!(&bytes[0..4], b"ttcf");
        assert_eq!(sfnt::get_u32(bytes, 8).expect("numFonts"), 2);

        // First entry is apache/alpha (id order), holding table bbbb.
        let first = sfnt::get_u32(bytes, 12).expect("offset 0") as usize;
        let second = sfnt::get_u32(bytes, 16).expect("offset 1") as usize;
        assert!(first < second);

        let (_, first_records) = sfnt::parse_table_directory(&bytes[first..]).expect("first dir");
        assert_eq!(&first_records[0].tag, b"bbbb");
        // Offsets are absolute within the container.
        let table_at = first_records[0].offset as usize;
        assert_eq!(&bytes[table_at..table_at + 4], &[9, 9, 9, 9]);

        let (_, second_records) = sfnt::parse_table_directory(&bytes[second..]).expect("second dir");
        assert_eq!(&second_records[0].tag, b"aaaa");
        let table_at = second_records[0].offset as usize;
        assert_eq!(&bytes[table_at..table_at + 5], &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn advertised_name_is_read_from_the_packed_program() {
        let font = font_with_tables(&[(*b"name", name_table("Subset Sans Regular"))]);

        let mut fonts = BTreeMap::new();
        fonts.insert("ofl/subsetsans".to_string(), font);

        let collection = assemble(&fonts).expect("assemble");
        assert_eq!(
            collection.families.get("ofl/subsetsans").map(String::as_str),
            Some("Subset Sans Regular")
        );
    }

    #[test]
    fn nameless_fonts_are_packed_without_a_family_entry() {
        let font = font_with_tables(&[(*b"aaaa", vec![0, 0, 0, 0])]);

        let mut fonts = BTreeMap::new();
        fonts.insert("ofl/anon".to_string(), font);

        let collection = assemble(&fonts).expect("assemble");
        assert_eq!(sfnt::get_u32(&collection.bytes, 8).expect("numFonts"), 1);
        assert!(collection.families.is_empty());
    }

    #[test]
    fn corrupt_member_font_is_an_error() {
        let mut fonts = BTreeMap::new();
        fonts.insert("ofl/broken".to_string(), b"not a font".to_vec());
        assert!(assemble(&fonts).is_err());
    }
}
