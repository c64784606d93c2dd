//! The read-only language/script reference database.
//!
//! Loaded once per run from a directory of textproto records (the layout
//! of the upstream language metadata package: `languages/*.textproto`
//! and `scripts/*.textproto`), then handed around by shared reference.
//! Nothing mutates it after construction.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Result};
use regex::Regex;
use walkdir::WalkDir;

use crate::textproto::{block_re, number_re, scalar_re, unescape};

/// Reference entry for one language code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageInfo {
    pub id: String,
    pub script: String,
    pub population: u64,
    /// Representative sample ("tester") string, when the upstream data
    /// provides one.
    pub sample_text: Option<String>,
}

/// Reference entry for one script code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptInfo {
    pub id: String,
    pub name: String,
}

/// Immutable lookup service over the language and script reference data.
#[derive(Debug, Default)]
pub struct LanguageDb {
    languages: BTreeMap<String, LanguageInfo>,
    scripts: BTreeMap<String, ScriptInfo>,
}

impl LanguageDb {
    pub fn new(languages: Vec<LanguageInfo>, scripts: Vec<ScriptInfo>) -> Self {
        Self {
            languages: languages.into_iter().map(|l| (l.id.clone(), l)).collect(),
            scripts: scripts.into_iter().map(|s| (s.id.clone(), s)).collect(),
        }
    }

    /// A database with no entries; every lookup misses and sample-text
    /// resolution falls through to its universal fallback.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the reference data from `dir/languages` and `dir/scripts`.
    /// Individual malformed records are skipped; a missing directory is
    /// an error (the caller asked for data that is not there).
    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.exists() {
            return Err(anyhow!("language data directory does not exist: {}", dir.display()));
        }

        let id_re = scalar_re("id")?;
        let script_re = scalar_re("script")?;
        let name_re = scalar_re("name")?;
        let population_re = number_re("population")?;
        let sample_block_re = block_re("sample_text")?;
        // Tester strings sit indented inside the sample_text block.
        let tester_re = Regex::new(r#"styles:\s*"(.*?)""#)?;

        let mut languages = Vec::new();
        for content in read_textprotos(&dir.join("languages")) {
            let Some(id) = capture(&id_re, &content) else { continue };
            let Some(script) = capture(&script_re, &content) else { continue };
            let population = population_re
                .captures(&content)
                .and_then(|c| c[1].parse::<u64>().ok())
                .unwrap_or(0);
            let sample_text = sample_block_re
                .captures(&content)
                .and_then(|block| capture(&tester_re, block.get(1).map_or("", |m| m.as_str())));
            languages.push(LanguageInfo { id, script, population, sample_text });
        }

        let mut scripts = Vec::new();
        for content in read_textprotos(&dir.join("scripts")) {
            let Some(id) = capture(&id_re, &content) else { continue };
            let Some(name) = capture(&name_re, &content) else { continue };
            scripts.push(ScriptInfo { id, name });
        }

        Ok(Self::new(languages, scripts))
    }

    pub fn language(&self, code: &str) -> Option<&LanguageInfo> {
        self.languages.get(code)
    }

    pub fn languages_with_script<'a>(
        &'a self,
        script: &str,
    ) -> impl Iterator<Item = &'a LanguageInfo> + 'a {
        let script = script.to_string();
        self.languages.values().filter(move |lang| lang.script == script)
    }

    /// Find a script id by its canonical name, ignoring ASCII case.
    pub fn script_id_by_name(&self, name: &str) -> Option<&str> {
        self.scripts
            .values()
            .find(|script| script.name.eq_ignore_ascii_case(name))
            .map(|script| script.id.as_str())
    }

    pub fn language_count(&self) -> usize {
        self.languages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty() && self.scripts.is_empty()
    }
}

fn capture(re: &Regex, content: &str) -> Option<String> {
    re.captures(content)
        .map(|caps| unescape(&caps[1]))
        .filter(|value| !value.is_empty())
}

fn read_textprotos(dir: &Path) -> Vec<String> {
    let mut contents = Vec::new();
    if !dir.exists() {
        return contents;
    }

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).into_iter().flatten() {
        let path = entry.path();
        let is_textproto = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("textproto"));
        if !entry.file_type().is_file() || !is_textproto {
            continue;
        }
        if let Ok(content) = fs::read_to_string(path) {
            contents.push(content);
        }
    }

    contents
}
