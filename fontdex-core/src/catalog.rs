//! Catalog finalization and serialization.

use std::collections::BTreeMap;
use std::io::Write;

use anyhow::Result;

use crate::descriptor::FamilyRecord;

/// What to do with families whose preview subsetting failed: keep them
/// with a null `preview_family` (clients show no preview but can still
/// browse and install), or drop them from the catalog entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingPreviewPolicy {
    Retain,
    Drop,
}

/// Join the advertised preview names into the records by id, apply the
/// missing-preview policy, and sort case-insensitively by family name.
/// The result is what gets serialized — nothing downstream reorders it.
pub fn finalize_catalog(
    mut records: Vec<FamilyRecord>,
    preview_families: &BTreeMap<String, String>,
    policy: MissingPreviewPolicy,
) -> Vec<FamilyRecord> {
    for record in &mut records {
        record.preview_family = preview_families.get(&record.id).cloned();
    }

    if policy == MissingPreviewPolicy::Drop {
        records.retain(|record| record.preview_family.is_some());
    }

    records.sort_by_cached_key(|record| record.family.to_lowercase());
    records
}

/// Serialize the catalog as prettified JSON. Non-ASCII sample strings
/// are written as-is, not escaped.
pub fn write_catalog(records: &[FamilyRecord], mut w: impl Write) -> Result<()> {
    let json = serde_json::to_string_pretty(records)?;
    w.write_all(json.as_bytes())?;
    Ok(())
}

/// Compact, brotli-compressed rendition of the catalog for
/// network-efficient distribution.
pub fn compress_catalog(records: &[FamilyRecord]) -> Result<Vec<u8>> {
    let compact = serde_json::to_vec(records)?;

    let params = brotli::enc::BrotliEncoderParams { quality: 11, ..Default::default() };
    let mut out = Vec::new();
    brotli::BrotliCompress(&mut compact.as_slice(), &mut out, &params)?;
    Ok(out)
}
