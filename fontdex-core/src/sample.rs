//! Sample-text resolution: one representative preview string per family.
//!
//! The ladder runs from explicit authorial intent down to a generic
//! pangram, and its order is load-bearing — reordering the tiers changes
//! the preview text of real families:
//!
//! 1. the descriptor's own sample-text override;
//! 2. the first declared language code with a tester string;
//! 3. the most-spoken tester among languages of the primary script;
//! 4. the Latin equivalent of tier 3 when a latin subset is declared;
//! 5. remaining subsets, normalized into script names, most-spoken
//!    tester first;
//! 6. the pangram.

use crate::descriptor::FamilyRecord;
use crate::langdb::LanguageDb;

/// Universal fallback; guarantees `preview_string` is never empty.
pub const FALLBACK_PANGRAM: &str = "The quick brown fox jumps over the lazy dog.";

/// Resolve the preview string for one family against the reference
/// database. Deterministic for identical inputs, and never empty.
pub fn resolve_sample_text(record: &FamilyRecord, db: &LanguageDb) -> String {
    if let Some(text) = &record.sample_text_override {
        if !text.trim().is_empty() {
            return text.clone();
        }
    }

    for code in &record.languages {
        if let Some(tester) = db.language(code).and_then(|lang| lang.sample_text.as_deref()) {
            return tester.to_string();
        }
    }

    if let Some(script) = &record.primary_script {
        if let Some(tester) = best_tester_for_script(db, script) {
            return tester.to_string();
        }
    }

    if record.subsets.iter().any(|s| s == "latin" || s == "latin-ext") {
        if let Some(tester) = db
            .script_id_by_name("Latin")
            .and_then(|script| best_tester_for_script(db, script))
        {
            return tester.to_string();
        }
    }

    for subset in &record.subsets {
        if matches!(subset.as_str(), "menu" | "latin" | "latin-ext") {
            continue;
        }
        let Some(script) = db.script_id_by_name(&script_name_from_subset(subset)) else {
            continue;
        };
        if let Some(tester) = best_tester_for_script(db, script) {
            return tester.to_string();
        }
    }

    FALLBACK_PANGRAM.to_string()
}

/// Highest-population tester string among the languages of a script.
fn best_tester_for_script<'a>(db: &'a LanguageDb, script: &str) -> Option<&'a str> {
    db.languages_with_script(script)
        .filter(|lang| lang.sample_text.is_some())
        .max_by_key(|lang| lang.population)
        .and_then(|lang| lang.sample_text.as_deref())
}

/// Best-effort subset-tag → script-name transform: hyphens become
/// spaces, words are title-cased. Irregularly named subsets simply miss
/// the script table; that is accepted behavior, not something to patch
/// over with guesses.
fn script_name_from_subset(tag: &str) -> String {
    tag.split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::LicenseCategory;
    use crate::langdb::{LanguageInfo, ScriptInfo};

    fn record() -> FamilyRecord {
        FamilyRecord {
            id: "ofl/sample".to_string(),
            family: "Sample".to_string(),
            display_name: "Sample".to_string(),
            designer: "Nobody".to_string(),
            license: LicenseCategory::Ofl,
            category: vec!["SANS_SERIF".to_string()],
            subsets: Vec::new(),
            is_variable: false,
            font_files: Vec::new(),
            preview_string: String::new(),
            preview_family: None,
            languages: Vec::new(),
            primary_script: None,
            sample_text_override: None,
        }
    }

    fn lang(id: &str, script: &str, population: u64, tester: Option<&str>) -> LanguageInfo {
        LanguageInfo {
            id: id.to_string(),
            script: script.to_string(),
            population,
            sample_text: tester.map(str::to_string),
        }
    }

    fn script(id: &str, name: &str) -> ScriptInfo {
        ScriptInfo { id: id.to_string(), name: name.to_string() }
    }

    fn devanagari_db() -> LanguageDb {
        LanguageDb::new(
            vec![
                lang("aa_Deva", "Deva", 10_000_000, Some("छोटा नमूना")),
                lang("bb_Deva", "Deva", 50_000_000, Some("बड़ा नमूना")),
                lang("cc_Deva", "Deva", 90_000_000, None),
                lang("en_Latn", "Latn", 1_000_000_000, Some("Sphinx of black quartz")),
            ],
            vec![script("Deva", "Devanagari"), script("Latn", "Latin")],
        )
    }

    #[test]
    fn override_wins_over_everything() {
        let mut record = record();
        record.sample_text_override = Some("Custom sample".to_string());
        record.languages = vec!["en_Latn".to_string()];
        record.primary_script = Some("Deva".to_string());

        assert_eq!(resolve_sample_text(&record, &devanagari_db()), "Custom sample");
    }

    #[test]
    fn first_declared_language_with_tester_wins() {
        let mut record = record();
        record.languages = vec!["cc_Deva".to_string(), "aa_Deva".to_string(), "bb_Deva".to_string()];

        // cc_Deva has no tester, so the next declared code is used even
        // though bb_Deva is more populous.
        assert_eq!(resolve_sample_text(&record, &devanagari_db()), "छोटा नमूना");
    }

    #[test]
    fn primary_script_picks_highest_population_tester() {
        let mut record = record();
        record.primary_script = Some("Deva".to_string());

        // cc_Deva is the most populous but has no tester; bb_Deva wins.
        assert_eq!(resolve_sample_text(&record, &devanagari_db()), "बड़ा नमूना");
    }

    #[test]
    fn latin_subset_resolves_through_the_latin_script() {
        let mut record = record();
        record.subsets = vec!["latin-ext".to_string()];

        assert_eq!(resolve_sample_text(&record, &devanagari_db()), "Sphinx of black quartz");
    }

    #[test]
    fn remaining_subsets_are_normalized_into_script_names() {
        let mut record = record();
        record.subsets = vec!["devanagari".to_string()];

        assert_eq!(resolve_sample_text(&record, &devanagari_db()), "बड़ा नमूना");
    }

    #[test]
    fn unmatched_subsets_fall_through_to_the_pangram() {
        let mut record = record();
        record.subsets = vec!["some-unknown-subset".to_string()];

        assert_eq!(resolve_sample_text(&record, &devanagari_db()), FALLBACK_PANGRAM);
    }

    #[test]
    fn empty_database_always_yields_the_pangram() {
        let mut record = record();
        record.languages = vec!["en_Latn".to_string()];
        record.primary_script = Some("Latn".to_string());
        record.subsets = vec!["latin".to_string()];

        assert_eq!(resolve_sample_text(&record, &LanguageDb::empty()), FALLBACK_PANGRAM);
    }

    #[test]
    fn resolution_is_deterministic() {
        let mut record = record();
        record.primary_script = Some("Deva".to_string());
        let db = devanagari_db();

        let first = resolve_sample_text(&record, &db);
        let second = resolve_sample_text(&record, &db);
        assert_eq!(first, second);
    }

    #[test]
    fn script_names_title_case_each_word() {
        assert_eq!(script_name_from_subset("devanagari"), "Devanagari");
        assert_eq!(script_name_from_subset("chinese-hongkong"), "Chinese Hongkong");
        assert_eq!(script_name_from_subset("old-italic"), "Old Italic");
    }
}
