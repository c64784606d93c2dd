//! Shaping-aware preview subsetting.
//!
//! The subset request is the union of two views of the preview string:
//! the characters mapped through the font's character map, and the glyph
//! indices an actual shaping pass produces. The union matters — a client
//! that shapes the preview (getting ligature and substitution glyphs)
//! and a client that renders unshaped characters must both land on
//! glyphs that survived the subset.
//!
//! The output is a rebuilt, self-contained TrueType font: glyph data is
//! really removed (not just zeroed), glyph ids are remapped contiguously
//! and composite references are rewritten. Naming and metrics-adjacent
//! tables are carried over so the subset still advertises its family
//! identity.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use anyhow::{anyhow, Context, Result};
use skrifa::{FontRef as SkrifaFontRef, MetadataProvider};

use crate::sfnt;

/// Tables copied into the subset untouched when present.
const VERBATIM_TABLES: [&[u8; 4]; 6] = [b"name", b"OS/2", b"cvt ", b"fpgm", b"prep", b"gasp"];

/// A reduced font program plus the soft conditions met while building it.
#[derive(Debug, Clone)]
pub struct PreviewFont {
    pub bytes: Vec<u8>,
    /// Shaped positions that resolved to `.notdef` — characters of the
    /// preview string this font cannot render. Non-zero is a coverage
    /// warning, never a failure.
    pub missing_glyphs: usize,
}

/// Subset `data` down to the glyphs needed to render `text`.
///
/// Every failure (unparseable font, unsupported outline format,
/// truncated tables) is an ordinary error for the caller to contain at
/// the per-family boundary.
pub fn subset_preview(data: &[u8], text: &str) -> Result<PreviewFont> {
    let (shaped, missing_glyphs) = shape_glyph_ids(data, text)?;
    let mapped = charmap_glyph_ids(data, text)?;

    let mut glyph_ids: BTreeSet<u16> = BTreeSet::new();
    glyph_ids.insert(0); // .notdef always survives
    glyph_ids.extend(&shaped);
    glyph_ids.extend(mapped.values().copied());

    let bytes = rebuild_font(data, &glyph_ids, &mapped)?;
    Ok(PreviewFont { bytes, missing_glyphs })
}

/// Run the preview string through a real shaping pass and collect the
/// glyph ids the rendering pipeline would use.
fn shape_glyph_ids(data: &[u8], text: &str) -> Result<(Vec<u16>, usize)> {
    let face = rustybuzz::Face::from_slice(data, 0)
        .ok_or_else(|| anyhow!("font face is not shapeable"))?;

    let mut buffer = rustybuzz::UnicodeBuffer::new();
    buffer.push_str(text);
    let glyphs = rustybuzz::shape(&face, &[], buffer);

    let mut ids = Vec::new();
    let mut missing = 0;
    for info in glyphs.glyph_infos() {
        if info.glyph_id == 0 {
            missing += 1;
        } else if let Ok(id) = u16::try_from(info.glyph_id) {
            ids.push(id);
        }
    }

    Ok((ids, missing))
}

/// Map each character of the preview string through the cmap. The
/// result keeps the char → glyph association so the rebuilt cmap can be
/// expressed in remapped ids.
fn charmap_glyph_ids(data: &[u8], text: &str) -> Result<BTreeMap<char, u16>> {
    let font = SkrifaFontRef::new(data).context("reading font tables")?;
    let charmap = font.charmap();

    let mut mapped = BTreeMap::new();
    for ch in text.chars() {
        if let Some(gid) = charmap.map(ch) {
            if let Ok(gid) = u16::try_from(gid.to_u32()) {
                if gid != 0 {
                    mapped.insert(ch, gid);
                }
            }
        }
    }

    Ok(mapped)
}

fn rebuild_font(
    data: &[u8],
    glyph_ids: &BTreeSet<u16>,
    mapped: &BTreeMap<char, u16>,
) -> Result<Vec<u8>> {
    let glyf = sfnt::find_table(data, b"glyf")
        .ok_or_else(|| anyhow!("unsupported outline format: no glyf table"))?;
    let loca = sfnt::find_table(data, b"loca").ok_or_else(|| anyhow!("missing loca table"))?;
    let head = sfnt::find_table(data, b"head").ok_or_else(|| anyhow!("missing head table"))?;
    let maxp = sfnt::find_table(data, b"maxp").ok_or_else(|| anyhow!("missing maxp table"))?;
    let hhea = sfnt::find_table(data, b"hhea").ok_or_else(|| anyhow!("missing hhea table"))?;
    let hmtx = sfnt::find_table(data, b"hmtx").ok_or_else(|| anyhow!("missing hmtx table"))?;

    let glyph_count = sfnt::get_u16(maxp, 4)?;
    let loca_format = sfnt::get_i16(head, 50)?;
    let loca_offsets = parse_loca(loca, loca_format, glyph_count)?;

    // Close the requested set over composite components; out-of-range
    // requests (stale cmap entries in broken fonts) are ignored.
    let mut keep: BTreeSet<u16> =
        glyph_ids.iter().copied().filter(|&gid| gid < glyph_count).collect();
    keep.insert(0);
    for gid in keep.clone() {
        collect_components(glyf, &loca_offsets, gid, &mut keep);
    }

    let remap: HashMap<u16, u16> = keep
        .iter()
        .enumerate()
        .map(|(new_gid, &old_gid)| (old_gid, new_gid as u16))
        .collect();
    let new_count = keep.len() as u16;

    let (new_glyf, new_offsets) = rebuild_glyf(glyf, &loca_offsets, &keep, &remap);
    let new_loca_format: i16 = if new_glyf.len() > 0x1FFFE { 1 } else { 0 };
    let new_loca = build_loca(&new_offsets, new_loca_format);

    let metric_count = sfnt::get_u16(hhea, 34)? as usize;
    let new_hmtx = rebuild_hmtx(hmtx, &keep, metric_count);

    let mut new_head = head.to_vec();
    sfnt::put_u32(&mut new_head, 8, 0); // checksum adjustment, fixed up at the end
    sfnt::put_i16(&mut new_head, 50, new_loca_format);

    let mut new_hhea = hhea.to_vec();
    sfnt::put_u16(&mut new_hhea, 34, new_count); // every glyph gets a full metric

    let mut new_maxp = maxp.to_vec();
    sfnt::put_u16(&mut new_maxp, 4, new_count);

    let mut tables: Vec<([u8; 4], Vec<u8>)> = vec![
        (*b"cmap", build_cmap(mapped, &remap)),
        (*b"glyf", new_glyf),
        (*b"head", new_head),
        (*b"hhea", new_hhea),
        (*b"hmtx", new_hmtx),
        (*b"loca", new_loca),
        (*b"maxp", new_maxp),
        (*b"post", build_post()),
    ];

    for tag in VERBATIM_TABLES {
        if let Some(table) = sfnt::find_table(data, tag) {
            tables.push((*tag, table.to_vec()));
        }
    }

    Ok(write_font(tables))
}

fn parse_loca(loca: &[u8], format: i16, glyph_count: u16) -> Result<Vec<u32>> {
    let count = glyph_count as usize + 1;
    let mut offsets = Vec::with_capacity(count);

    if format == 0 {
        for i in 0..count {
            offsets.push(u32::from(sfnt::get_u16(loca, i * 2).context("short loca truncated")?) * 2);
        }
    } else {
        for i in 0..count {
            offsets.push(sfnt::get_u32(loca, i * 4).context("long loca truncated")?);
        }
    }

    Ok(offsets)
}

fn build_loca(offsets: &[u32], format: i16) -> Vec<u8> {
    let mut out = Vec::new();
    if format == 0 {
        for &offset in offsets {
            out.extend_from_slice(&((offset / 2) as u16).to_be_bytes());
        }
    } else {
        for &offset in offsets {
            out.extend_from_slice(&offset.to_be_bytes());
        }
    }
    out
}

const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
const WE_HAVE_A_SCALE: u16 = 0x0008;
const MORE_COMPONENTS: u16 = 0x0020;
const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;

/// Walk a glyph's component records, pulling every referenced glyph into
/// the kept set (recursively — composites may nest).
fn collect_components(glyf: &[u8], loca_offsets: &[u32], gid: u16, keep: &mut BTreeSet<u16>) {
    let idx = gid as usize;
    if idx + 1 >= loca_offsets.len() {
        return;
    }

    let start = loca_offsets[idx] as usize;
    let end = loca_offsets[idx + 1] as usize;
    if start >= end || start + 10 > glyf.len() {
        return;
    }

    let contour_count = match sfnt::get_i16(glyf, start) {
        Ok(count) => count,
        Err(_) => return,
    };
    if contour_count >= 0 {
        return; // simple glyph
    }

    let mut pos = start + 10;
    loop {
        let (Ok(flags), Ok(component)) = (sfnt::get_u16(glyf, pos), sfnt::get_u16(glyf, pos + 2))
        else {
            return;
        };
        pos += 4;

        if keep.insert(component) {
            collect_components(glyf, loca_offsets, component, keep);
        }

        pos += if flags & ARG_1_AND_2_ARE_WORDS != 0 { 4 } else { 2 };
        if flags & WE_HAVE_A_SCALE != 0 {
            pos += 2;
        } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            pos += 4;
        } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
            pos += 8;
        }

        if flags & MORE_COMPONENTS == 0 {
            return;
        }
    }
}

/// Copy kept glyph outlines into a fresh glyf table, rewriting composite
/// component references to the remapped ids. Returns the table and the
/// per-glyph offsets for the new loca.
fn rebuild_glyf(
    glyf: &[u8],
    loca_offsets: &[u32],
    keep: &BTreeSet<u16>,
    remap: &HashMap<u16, u16>,
) -> (Vec<u8>, Vec<u32>) {
    let mut new_glyf: Vec<u8> = Vec::new();
    let mut new_offsets: Vec<u32> = Vec::new();

    for &old_gid in keep {
        new_offsets.push(new_glyf.len() as u32);

        let idx = old_gid as usize;
        if idx + 1 >= loca_offsets.len() {
            continue;
        }
        let start = loca_offsets[idx] as usize;
        let end = (loca_offsets[idx + 1] as usize).min(glyf.len());
        if start >= end {
            continue; // empty glyph keeps a zero-length slot
        }

        let mut glyph = glyf[start..end].to_vec();
        if let Ok(contour_count) = sfnt::get_i16(&glyph, 0) {
            if contour_count < 0 {
                rewrite_component_ids(&mut glyph, remap);
            }
        }

        new_glyf.extend_from_slice(&glyph);
        while new_glyf.len() % 4 != 0 {
            new_glyf.push(0);
        }
    }

    new_offsets.push(new_glyf.len() as u32);
    (new_glyf, new_offsets)
}

fn rewrite_component_ids(glyph: &mut [u8], remap: &HashMap<u16, u16>) {
    let mut pos = 10;
    loop {
        let (Ok(flags), Ok(old_gid)) = (sfnt::get_u16(glyph, pos), sfnt::get_u16(glyph, pos + 2))
        else {
            return;
        };

        if let Some(&new_gid) = remap.get(&old_gid) {
            sfnt::put_u16(glyph, pos + 2, new_gid);
        }
        pos += 4;

        pos += if flags & ARG_1_AND_2_ARE_WORDS != 0 { 4 } else { 2 };
        if flags & WE_HAVE_A_SCALE != 0 {
            pos += 2;
        } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            pos += 4;
        } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
            pos += 8;
        }

        if flags & MORE_COMPONENTS == 0 {
            return;
        }
    }
}

/// Per-glyph horizontal metrics for the kept set. Every glyph gets a
/// full advance/lsb pair; glyphs beyond the source's metric run reuse
/// its last advance, as the format prescribes.
fn rebuild_hmtx(hmtx: &[u8], keep: &BTreeSet<u16>, metric_count: usize) -> Vec<u8> {
    let mut out = Vec::new();

    for &old_gid in keep {
        let idx = old_gid as usize;
        if idx < metric_count {
            let offset = idx * 4;
            if offset + 4 <= hmtx.len() {
                out.extend_from_slice(&hmtx[offset..offset + 4]);
            } else {
                out.extend_from_slice(&[0, 0, 0, 0]);
            }
        } else {
            let advance = metric_count
                .checked_sub(1)
                .map(|last| last * 4)
                .filter(|&offset| offset + 2 <= hmtx.len())
                .map(|offset| [hmtx[offset], hmtx[offset + 1]])
                .unwrap_or([0, 0]);
            let lsb_offset = metric_count * 4 + (idx - metric_count) * 2;
            let lsb = if lsb_offset + 2 <= hmtx.len() {
                [hmtx[lsb_offset], hmtx[lsb_offset + 1]]
            } else {
                [0, 0]
            };
            out.extend_from_slice(&advance);
            out.extend_from_slice(&lsb);
        }
    }

    out
}

/// A cmap holding a single format 4 subtable over the preview string's
/// BMP characters, expressed in remapped glyph ids. Glyphs only
/// reachable through shaping stay addressable by id without a cmap
/// entry.
fn build_cmap(mapped: &BTreeMap<char, u16>, remap: &HashMap<u16, u16>) -> Vec<u8> {
    let pairs: Vec<(u16, u16)> = mapped
        .iter()
        .filter(|(ch, _)| (**ch as u32) < 0xFFFF)
        .filter_map(|(ch, old_gid)| remap.get(old_gid).map(|&new_gid| (*ch as u16, new_gid)))
        .collect();

    build_cmap_format4(&pairs)
}

/// `pairs` must be sorted by character and free of the 0xFFFF sentinel;
/// `build_cmap` guarantees both.
fn build_cmap_format4(pairs: &[(u16, u16)]) -> Vec<u8> {
    // Contiguous character runs become segments.
    let mut segments: Vec<(u16, u16, Vec<u16>)> = Vec::new();
    for &(ch, gid) in pairs {
        if let Some(last) = segments.last_mut() {
            if ch == last.1 + 1 {
                last.1 = ch;
                last.2.push(gid);
                continue;
            }
        }
        segments.push((ch, ch, vec![gid]));
    }
    segments.push((0xFFFF, 0xFFFF, vec![0])); // required sentinel

    let seg_count = segments.len() as u16;
    let seg_count_x2 = seg_count * 2;
    let entry_selector = (seg_count as f32).log2().floor() as u16;
    let search_range = 2u16.pow(u32::from(entry_selector)) * 2;
    let range_shift = seg_count_x2 - search_range;

    let mut end_codes = Vec::new();
    let mut start_codes = Vec::new();
    let mut id_deltas: Vec<i16> = Vec::new();
    let mut id_range_offsets: Vec<u16> = Vec::new();
    let mut glyph_id_array: Vec<u16> = Vec::new();

    for (i, (start, end, gids)) in segments.iter().enumerate() {
        start_codes.push(*start);
        end_codes.push(*end);

        if *start == 0xFFFF {
            id_deltas.push(1);
            id_range_offsets.push(0);
        } else if gids.len() == 1 {
            // idDelta arithmetic is modulo 65536, so the wrapping cast is
            // exactly right.
            id_deltas.push((i32::from(gids[0]) - i32::from(*start)) as i16);
            id_range_offsets.push(0);
        } else {
            id_deltas.push(0);
            let remaining = (segments.len() - i) as u16;
            id_range_offsets.push((remaining + glyph_id_array.len() as u16) * 2);
            glyph_id_array.extend_from_slice(gids);
        }
    }

    let subtable_len = 16 + seg_count as usize * 8 + glyph_id_array.len() * 2;
    let mut subtable = Vec::with_capacity(subtable_len);
    subtable.extend_from_slice(&4u16.to_be_bytes());
    subtable.extend_from_slice(&(subtable_len as u16).to_be_bytes());
    subtable.extend_from_slice(&0u16.to_be_bytes()); // language
    subtable.extend_from_slice(&seg_count_x2.to_be_bytes());
    subtable.extend_from_slice(&search_range.to_be_bytes());
    subtable.extend_from_slice(&entry_selector.to_be_bytes());
    subtable.extend_from_slice(&range_shift.to_be_bytes());
    for &end in &end_codes {
        subtable.extend_from_slice(&end.to_be_bytes());
    }
    subtable.extend_from_slice(&0u16.to_be_bytes()); // reservedPad
    for &start in &start_codes {
        subtable.extend_from_slice(&start.to_be_bytes());
    }
    for &delta in &id_deltas {
        subtable.extend_from_slice(&delta.to_be_bytes());
    }
    for &offset in &id_range_offsets {
        subtable.extend_from_slice(&offset.to_be_bytes());
    }
    for &gid in &glyph_id_array {
        subtable.extend_from_slice(&gid.to_be_bytes());
    }

    let mut cmap = Vec::new();
    cmap.extend_from_slice(&0u16.to_be_bytes()); // version
    cmap.extend_from_slice(&1u16.to_be_bytes()); // one encoding record
    cmap.extend_from_slice(&3u16.to_be_bytes()); // platform: Windows
    cmap.extend_from_slice(&1u16.to_be_bytes()); // encoding: Unicode BMP
    cmap.extend_from_slice(&12u32.to_be_bytes()); // subtable offset
    cmap.extend_from_slice(&subtable);
    cmap
}

/// post format 3: no glyph names, the smallest valid table.
fn build_post() -> Vec<u8> {
    let mut out = vec![0u8; 32];
    sfnt::put_u32(&mut out, 0, 0x0003_0000);
    out
}

/// Assemble the final single-font file: sorted directory, per-table
/// checksums, and the whole-file checksum adjustment in head.
fn write_font(mut tables: Vec<([u8; 4], Vec<u8>)>) -> Vec<u8> {
    tables.sort_by_key(|(tag, _)| u32::from_be_bytes(*tag));
    for (_, data) in &mut tables {
        while data.len() % 4 != 0 {
            data.push(0);
        }
    }

    let count = tables.len() as u16;
    let entry_selector = (count as f32).log2().floor() as u16;
    let search_range = 2u16.pow(u32::from(entry_selector)) * 16;
    let range_shift = count * 16 - search_range;

    let mut out = Vec::new();
    out.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    out.extend_from_slice(&count.to_be_bytes());
    out.extend_from_slice(&search_range.to_be_bytes());
    out.extend_from_slice(&entry_selector.to_be_bytes());
    out.extend_from_slice(&range_shift.to_be_bytes());

    let mut offset = 12 + tables.len() * 16;
    let mut head_offset = None;
    for (tag, data) in &tables {
        if tag == b"head" {
            head_offset = Some(offset);
        }
        out.extend_from_slice(tag);
        out.extend_from_slice(&sfnt::checksum(data).to_be_bytes());
        out.extend_from_slice(&(offset as u32).to_be_bytes());
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        offset += data.len();
    }
    for (_, data) in &tables {
        out.extend_from_slice(data);
    }

    if let Some(head) = head_offset {
        let adjustment = 0xB1B0_AFBAu32.wrapping_sub(sfnt::checksum(&out));
        sfnt::put_u32(&mut out, head + 8, adjustment);
    }

    out
}
