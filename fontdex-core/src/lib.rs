/// fontdex-core: the patient cataloguer of large font corpora
///
/// Given a corpus of type families (one descriptor file plus binaries per
/// family, grouped under a handful of license subtrees), this library
/// builds everything a font-browsing client needs to show crisp previews
/// without ever downloading a full font: a sorted JSON catalog of family
/// metadata and a single collection file holding a tiny, shaping-correct
/// subset of each family.
///
/// ## The pipeline, leaf first
///
/// - [`corpus`] walks the license subtrees and finds every family
///   descriptor, in a deterministic order.
/// - [`descriptor`] turns one descriptor file into a fully-typed
///   [`descriptor::FamilyRecord`] — or a recoverable parse error that
///   skips the family and nothing else.
/// - [`langdb`] loads the read-only language/script reference data once
///   and hands out lookups; it is built, then never mutated.
/// - [`sample`] resolves one representative preview string per family
///   through a fixed precision ladder, ending at a pangram that never
///   fails.
/// - [`subset`] shapes the preview string against the family's sample
///   font and rebuilds a minimal font containing exactly the glyphs that
///   rendering will touch — ligatures and script-specific substitutions
///   included.
/// - [`batch`] fans the subsetting work across a bounded worker pool and
///   contains every per-family failure at the task boundary.
/// - [`collection`] packs the surviving subsets into one multi-font
///   container, in id order, and records the family name each subset
///   *actually* advertises.
/// - [`catalog`] joins those names back into the records, applies the
///   missing-preview policy, sorts, and serializes.
///
/// Completion order of the parallel stage is deliberately unobservable in
/// both output artifacts: the catalog is sorted by family name and the
/// collection is ordered by family id.
pub mod batch;
pub mod catalog;
pub mod collection;
pub mod corpus;
pub mod descriptor;
pub mod langdb;
pub mod sample;
mod sfnt;
pub mod subset;
mod textproto;
