//! Family descriptor parsing and the catalog data model.

use anyhow::{bail, Result};
use regex::Regex;
use serde::Serialize;

use crate::corpus::LicenseCategory;
use crate::textproto::{block_re, scalar_re, unescape};

/// Remote root under which the corpus is published; file URLs are
/// synthesized relative to it.
pub const DEFAULT_BASE_URL: &str = "https://raw.githubusercontent.com/google/fonts/main";

/// One constituent binary of a family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FontFile {
    pub style: String,
    pub weight: u32,
    pub filename: String,
    pub url: String,
}

/// One catalog entry. Parsing either fully populates this structure or
/// fails; no partially-valid records exist downstream.
#[derive(Debug, Clone, Serialize)]
pub struct FamilyRecord {
    /// Synthetic `{license_dir}/{family_dir}` slug, unique per run. This
    /// is the only key joining the catalog to the preview collection;
    /// family names can repeat across license categories.
    pub id: String,
    pub family: String,
    pub display_name: String,
    pub designer: String,
    pub license: LicenseCategory,
    pub category: Vec<String>,
    pub subsets: Vec<String>,
    pub is_variable: bool,
    pub font_files: Vec<FontFile>,
    /// Resolved by the sample-text resolver; never empty once resolved.
    pub preview_string: String,
    /// Family name the subsetted preview font advertises. Stays `None`
    /// until the collection stage resolves it, and forever if subsetting
    /// failed.
    pub preview_family: Option<String>,
    #[serde(skip)]
    pub languages: Vec<String>,
    #[serde(skip)]
    pub primary_script: Option<String>,
    #[serde(skip)]
    pub sample_text_override: Option<String>,
}

impl FamilyRecord {
    /// The file whose glyphs feed the preview subset: the first declared
    /// regular (style `normal`, weight 400), else the last file in
    /// declaration order.
    pub fn sample_file(&self) -> Option<&FontFile> {
        self.font_files
            .iter()
            .find(|f| f.style == "normal" && f.weight == 400)
            .or_else(|| self.font_files.last())
    }
}

/// Descriptor parser with its pattern set compiled once, reused across
/// every family of a run.
pub struct DescriptorParser {
    name: Regex,
    display_name: Regex,
    designer: Regex,
    category: Regex,
    subsets: Regex,
    languages: Regex,
    primary_script: Regex,
    axes_block: Regex,
    sample_text_block: Regex,
    fonts_block: Regex,
    file_style: Regex,
    file_weight: Regex,
    file_filename: Regex,
    sample_styles: Regex,
}

impl DescriptorParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            name: scalar_re("name")?,
            display_name: scalar_re("display_name")?,
            designer: scalar_re("designer")?,
            category: scalar_re("category")?,
            subsets: scalar_re("subsets")?,
            languages: scalar_re("languages")?,
            primary_script: scalar_re("primary_script")?,
            axes_block: block_re("axes")?,
            sample_text_block: block_re("sample_text")?,
            fonts_block: block_re("fonts")?,
            // Fields inside a block are indented, so these are not
            // line-anchored.
            file_style: Regex::new(r#"style:\s*"(.*?)""#)?,
            file_weight: Regex::new(r"weight:\s*(\d+)")?,
            file_filename: Regex::new(r#"filename:\s*"(.*?)""#)?,
            sample_styles: Regex::new(r#"styles:\s*"(.*?)""#)?,
        })
    }

    /// Parse one descriptor into a FamilyRecord. Missing required
    /// scalars and descriptors yielding zero usable file records are
    /// recoverable errors; the caller skips the family and moves on.
    pub fn parse(
        &self,
        content: &str,
        license: LicenseCategory,
        family_dir: &str,
        base_url: &str,
    ) -> Result<FamilyRecord> {
        let family = match self.scalar(&self.name, content) {
            Some(name) => name,
            None => bail!("descriptor has no family name"),
        };
        let designer = match self.scalar(&self.designer, content) {
            Some(designer) => designer,
            None => bail!("descriptor has no designer"),
        };
        let display_name = self
            .scalar(&self.display_name, content)
            .unwrap_or_else(|| family.clone());

        let category = self.list(&self.category, content);
        if category.is_empty() {
            bail!("descriptor declares no category");
        }

        let mut subsets = self.list(&self.subsets, content);
        if subsets.is_empty() {
            bail!("descriptor declares no subsets");
        }
        // "menu" is a synthetic subset for menu rendering, not a script;
        // it never reaches the catalog.
        subsets.retain(|s| s != "menu");

        let font_files = self.font_files(content, license, family_dir, base_url);
        if font_files.is_empty() {
            bail!("descriptor yields no usable font file records");
        }

        let sample_text_override = self
            .sample_text_block
            .captures(content)
            .and_then(|block| self.scalar(&self.sample_styles, block.get(1).map_or("", |m| m.as_str())));

        Ok(FamilyRecord {
            id: format!("{}/{}", license.dir_name(), family_dir),
            family,
            display_name,
            designer,
            license,
            category,
            subsets,
            is_variable: self.axes_block.is_match(content),
            font_files,
            preview_string: String::new(),
            preview_family: None,
            languages: self.list(&self.languages, content),
            primary_script: self.scalar(&self.primary_script, content),
            sample_text_override,
        })
    }

    fn scalar(&self, re: &Regex, content: &str) -> Option<String> {
        re.captures(content)
            .map(|caps| unescape(&caps[1]))
            .filter(|value| !value.is_empty())
    }

    fn list(&self, re: &Regex, content: &str) -> Vec<String> {
        re.captures_iter(content)
            .map(|caps| unescape(&caps[1]))
            .filter(|value| !value.is_empty())
            .collect()
    }

    /// Extract the repeated `fonts { ... }` blocks. A block missing any
    /// of style/weight/filename is dropped; the declaration order of the
    /// surviving blocks is preserved.
    fn font_files(
        &self,
        content: &str,
        license: LicenseCategory,
        family_dir: &str,
        base_url: &str,
    ) -> Vec<FontFile> {
        let mut files = Vec::new();

        for block in self.fonts_block.captures_iter(content) {
            let body = block.get(1).map_or("", |m| m.as_str());

            let style = self.file_style.captures(body).map(|c| unescape(&c[1]));
            let weight = self
                .file_weight
                .captures(body)
                .and_then(|c| c[1].parse::<u32>().ok());
            let filename = self.file_filename.captures(body).map(|c| unescape(&c[1]));

            let (Some(style), Some(weight), Some(filename)) = (style, weight, filename) else {
                continue;
            };

            let url = format!("{base_url}/{}/{family_dir}/{filename}", license.dir_name());
            files.push(FontFile { style, weight, filename, url });
        }

        files
    }
}
