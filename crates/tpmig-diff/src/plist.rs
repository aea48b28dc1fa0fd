//! Plist folder and plist XML index comparison.
//!
//! A `.plist` file holds named blocks opened by a keyword (`GlobalPList` by
//! default) and closed by a `}` line carrying an `#end` marker:
//!
//! ```text
//! GlobalPList PL_CORE [Mask]
//! {
//!     Pat core_a;
//! } #end PL_CORE
//! ```
//!
//! The XML index names the plists a TP loads. It is scanned with patterns
//! rather than parsed, so malformed XML still yields its names.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tpmig_types::{PlistBlockDiff, PlistFileDiff, PlistFolderDiff, XmlPlistDiff};
use tracing::{debug, warn};

use crate::directory::{list_matching, FilenameFilter};
use crate::error::Result;
use crate::lenient::read_text;

const PLIST_SUFFIX: &str = ".plist";

fn markup_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<!--.*?-->|<\?.*?\?>|<![^>]*>").expect("valid XML markup regex")
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid XML tag regex"))
}

fn attribute_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"[\w:.-]+\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid attribute regex")
    })
}

fn separator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\s,;]+").expect("valid separator regex"))
}

fn plist_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]+$").expect("valid plist name regex"))
}

fn plist_files() -> FilenameFilter {
    FilenameFilter::new("", PLIST_SUFFIX)
}

/// Every block name in `content`, in file order, repeats included.
pub fn plist_names(content: &str, keyword: &str) -> Result<Vec<String>> {
    let header = Regex::new(&format!(r"{}\s+(\S+)\s", regex::escape(keyword)))?;
    Ok(header
        .captures_iter(content)
        .map(|caps| caps[1].to_string())
        .collect())
}

/// Block text by name. A repeated name keeps its last block.
pub fn plist_blocks(content: &str, keyword: &str) -> Result<BTreeMap<String, String>> {
    let block = Regex::new(&format!(
        r"{}\s+(\S+)[\s\S]+?\}}[^\n]*#end[^\n]*",
        regex::escape(keyword)
    ))?;
    Ok(block
        .captures_iter(content)
        .map(|caps| (caps[1].to_string(), caps[0].to_string()))
        .collect())
}

/// Compare the `.plist` files of two folders block by block.
///
/// Filenames are matched exactly; the `.plist` suffix is case-insensitive.
/// Blocks compare by their text with surrounding whitespace trimmed.
pub fn compare_plist_folders(
    reference_dir: &Path,
    new_dir: &Path,
    keyword: &str,
) -> PlistFolderDiff {
    let mut result = PlistFolderDiff {
        reference_dir: reference_dir.to_path_buf(),
        new_dir: new_dir.to_path_buf(),
        ..PlistFolderDiff::default()
    };

    let reference_files = list_matching(reference_dir, &plist_files()).unwrap_or_else(|e| {
        warn!(error = %e, "reference plist folder not listed");
        result.reference_error = Some(e.to_string());
        BTreeMap::new()
    });
    let new_files = list_matching(new_dir, &plist_files()).unwrap_or_else(|e| {
        warn!(error = %e, "new plist folder not listed");
        result.new_error = Some(e.to_string());
        BTreeMap::new()
    });

    let reference_names: BTreeSet<&String> = reference_files.keys().collect();
    let new_names: BTreeSet<&String> = new_files.keys().collect();
    result.files_only_in_reference = reference_names
        .difference(&new_names)
        .map(|s| s.to_string())
        .collect();
    result.files_only_in_new = new_names
        .difference(&reference_names)
        .map(|s| s.to_string())
        .collect();

    for name in reference_names.intersection(&new_names) {
        let mut file = PlistFileDiff {
            filename: name.to_string(),
            reference_path: reference_files[*name].clone(),
            new_path: new_files[*name].clone(),
            ..PlistFileDiff::default()
        };
        if let Err(e) = diff_blocks(&mut file, keyword) {
            warn!(error = %e, file = %name, "plist pair not compared");
            file.error = Some(e.to_string());
        }
        result.files_in_both.push(file);
    }

    debug!(
        only_in_reference = result.files_only_in_reference.len(),
        only_in_new = result.files_only_in_new.len(),
        in_both = result.files_in_both.len(),
        "plist folder comparison done"
    );
    result
}

fn diff_blocks(file: &mut PlistFileDiff, keyword: &str) -> Result<()> {
    let reference = plist_blocks(&read_text(&file.reference_path)?, keyword)?;
    let new = plist_blocks(&read_text(&file.new_path)?, keyword)?;

    for (name, ref_block) in &reference {
        let Some(new_block) = new.get(name) else {
            file.only_in_reference.push(name.clone());
            continue;
        };
        let (ref_block, new_block) = (ref_block.trim(), new_block.trim());
        if ref_block == new_block {
            file.identical.push(name.clone());
        } else {
            file.different.push(PlistBlockDiff {
                name: name.clone(),
                ref_block: ref_block.to_string(),
                new_block: new_block.to_string(),
            });
        }
    }
    file.only_in_new = new
        .keys()
        .filter(|name| !reference.contains_key(*name))
        .cloned()
        .collect();
    Ok(())
}

/// Block names defined more than once within the same `.plist` file, by
/// filename. Files without repeats are left out.
///
/// An unlistable folder or unreadable file contributes nothing.
pub fn check_duplicates(dir: &Path, keyword: &str) -> BTreeMap<String, Vec<String>> {
    let files = match list_matching(dir, &plist_files()) {
        Ok(files) => files,
        Err(e) => {
            warn!(error = %e, "plist folder not listed for duplicates");
            return BTreeMap::new();
        }
    };

    let mut duplicates = BTreeMap::new();
    for (filename, path) in files {
        let names = match read_text(&path).and_then(|content| plist_names(&content, keyword)) {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "plist file skipped");
                continue;
            }
        };
        let repeated = repeated_names(&names);
        if !repeated.is_empty() {
            duplicates.insert(filename, repeated);
        }
    }
    duplicates
}

/// Names occurring more than once, in order of first occurrence.
fn repeated_names(names: &[String]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for name in names {
        *counts.entry(name.as_str()).or_default() += 1;
    }
    let mut seen = BTreeSet::new();
    names
        .iter()
        .filter(|name| counts[name.as_str()] > 1 && seen.insert(name.as_str()))
        .cloned()
        .collect()
}

/// Plist-like identifiers in an XML document: attribute values and text
/// tokens (split on whitespace, `,` and `;`) that start with a letter and
/// continue with letters, digits or `_`. Sorted, without repeats.
pub fn xml_plist_names(xml: &str) -> BTreeSet<String> {
    let body = markup_re().replace_all(xml, " ");
    let mut names = BTreeSet::new();
    let mut keep = |candidate: &str| {
        let candidate = candidate.trim();
        if plist_name_re().is_match(candidate) {
            names.insert(candidate.to_string());
        }
    };

    for tag in tag_re().find_iter(&body) {
        for caps in attribute_re().captures_iter(tag.as_str()) {
            if let Some(value) = caps.get(1).or_else(|| caps.get(2)) {
                keep(value.as_str());
            }
        }
    }
    for text in tag_re().split(&body) {
        for token in separator_re().split(text) {
            keep(token);
        }
    }
    names
}

/// Compare the names two XML indexes reference, then check the new index
/// against the blocks defined in the new `.plist` folder.
pub fn compare_xml_plist(
    reference_xml: &Path,
    new_xml: &Path,
    new_plist_dir: &Path,
    keyword: &str,
) -> XmlPlistDiff {
    let mut result = XmlPlistDiff {
        reference_xml: reference_xml.to_path_buf(),
        new_xml: new_xml.to_path_buf(),
        ..XmlPlistDiff::default()
    };

    let reference_names = read_text(reference_xml)
        .map(|xml| xml_plist_names(&xml))
        .unwrap_or_else(|e| {
            warn!(error = %e, "reference plist XML not loaded");
            result.load_error_reference = Some(e.to_string());
            BTreeSet::new()
        });
    let new_names = read_text(new_xml)
        .map(|xml| xml_plist_names(&xml))
        .unwrap_or_else(|e| {
            warn!(error = %e, "new plist XML not loaded");
            result.load_error_new = Some(e.to_string());
            BTreeSet::new()
        });

    result.only_in_reference = reference_names.difference(&new_names).cloned().collect();
    result.only_in_new = new_names.difference(&reference_names).cloned().collect();
    result.in_both = reference_names.intersection(&new_names).cloned().collect();

    match defined_names(new_plist_dir, keyword) {
        Ok(defined) => {
            result.missing_from_new_dir = new_names.difference(&defined).cloned().collect();
            result.unreferenced_in_new = defined.difference(&new_names).cloned().collect();
        }
        Err(e) => {
            warn!(error = %e, "new plist folder not listed for cross-check");
            result.plist_dir_error = Some(e.to_string());
        }
    }

    result.reference_names = reference_names.into_iter().collect();
    result.new_names = new_names.into_iter().collect();

    debug!(
        only_in_reference = result.only_in_reference.len(),
        only_in_new = result.only_in_new.len(),
        missing_from_new_dir = result.missing_from_new_dir.len(),
        unreferenced_in_new = result.unreferenced_in_new.len(),
        "plist XML comparison done"
    );
    result
}

/// Every block name defined across the `.plist` files of `dir`.
fn defined_names(dir: &Path, keyword: &str) -> Result<BTreeSet<String>> {
    let mut defined = BTreeSet::new();
    for path in list_matching(dir, &plist_files())?.values() {
        match read_text(path).and_then(|content| plist_names(&content, keyword)) {
            Ok(names) => defined.extend(names),
            Err(e) => warn!(error = %e, "plist file skipped"),
        }
    }
    Ok(defined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    use tempfile::TempDir;

    const KEYWORD: &str = "GlobalPList";

    const CORE_REF: &str = "\
GlobalPList PL_CORE [Mask]
{
    Pat core_a;
} #end PL_CORE

GlobalPList PL_SHARED
{
    Pat shared;
} #end

GlobalPList PL_OLD
{
} #end
";

    const CORE_NEW: &str = "\
GlobalPList PL_CORE [Mask]
{
    Pat core_a;
    Pat core_b;
} #end PL_CORE

GlobalPList PL_SHARED
{
    Pat shared;
} #end
GlobalPList PL_NEW
{
} #end
";

    fn setup() -> (TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let reference = dir.path().join("ref");
        let new = dir.path().join("new");
        fs::create_dir_all(&reference).unwrap();
        fs::create_dir_all(&new).unwrap();
        (dir, reference, new)
    }

    #[test]
    fn names_in_file_order_with_repeats() {
        let content = "GlobalPList B {\n} #end\n\
                       GlobalPList A\n{\n} #end\n\
                       GlobalPList B {\n} #end\n";
        assert_eq!(plist_names(content, KEYWORD).unwrap(), vec!["B", "A", "B"]);
    }

    #[test]
    fn blocks_run_through_the_end_marker_line() {
        let blocks = plist_blocks(CORE_REF, KEYWORD).unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(
            blocks["PL_CORE"],
            "GlobalPList PL_CORE [Mask]\n{\n    Pat core_a;\n} #end PL_CORE"
        );
    }

    #[test]
    fn later_block_with_same_name_wins() {
        let content = "GlobalPList A\n{\n  Pat one;\n} #end\n\
                       GlobalPList A\n{\n  Pat two;\n} #end\n";
        assert!(plist_blocks(content, KEYWORD).unwrap()["A"].contains("two"));
    }

    #[test]
    fn compares_folders_block_by_block() {
        let (_dir, reference, new) = setup();
        fs::write(reference.join("core.plist"), CORE_REF).unwrap();
        fs::write(new.join("core.plist"), CORE_NEW).unwrap();
        fs::write(reference.join("gone.PLIST"), "").unwrap();
        fs::write(new.join("added.plist"), "").unwrap();
        fs::write(new.join("notes.txt"), "GlobalPList X\n{\n} #end\n").unwrap();

        let result = compare_plist_folders(&reference, &new, KEYWORD);
        assert_eq!(result.files_only_in_reference, vec!["gone.PLIST"]);
        assert_eq!(result.files_only_in_new, vec!["added.plist"]);
        assert_eq!(result.files_in_both.len(), 1);

        let file = &result.files_in_both[0];
        assert!(file.error.is_none());
        assert_eq!(file.only_in_reference, vec!["PL_OLD"]);
        assert_eq!(file.only_in_new, vec!["PL_NEW"]);
        assert_eq!(file.identical, vec!["PL_SHARED"]);
        assert_eq!(file.different.len(), 1);
        assert_eq!(file.different[0].name, "PL_CORE");
        assert!(file.different[0].new_block.contains("core_b"));
    }

    #[test]
    fn unlistable_folder_is_recorded_on_its_side() {
        let (dir, _reference, new) = setup();
        fs::write(new.join("core.plist"), CORE_NEW).unwrap();

        let result = compare_plist_folders(&dir.path().join("absent"), &new, KEYWORD);
        assert!(result.reference_error.is_some());
        assert!(result.new_error.is_none());
        assert_eq!(result.files_only_in_new, vec!["core.plist"]);
    }

    #[test]
    fn reports_repeats_per_file() {
        let (_dir, _reference, new) = setup();
        let repeated = format!("{CORE_NEW}{CORE_NEW}GlobalPList PL_NEW\n{{\n}} #end\n");
        fs::write(new.join("dup.plist"), repeated).unwrap();
        fs::write(new.join("clean.plist"), CORE_NEW).unwrap();

        let duplicates = check_duplicates(&new, KEYWORD);
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates["dup.plist"], vec!["PL_CORE", "PL_SHARED", "PL_NEW"]);
    }

    #[test]
    fn duplicates_of_missing_folder_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_duplicates(&dir.path().join("absent"), KEYWORD).is_empty());
    }

    #[test]
    fn xml_names_from_attributes_and_text() {
        let xml = r#"<?xml version="1.0"?>
<!-- PL_COMMENTED is not loaded -->
<PlistList version="2">
  <Plist name="PL_CORE" file='core.plist'/>
  <Group>PL_SHARED, PL_NEW; x</Group>
</PlistList>
"#;
        let names: Vec<String> = xml_plist_names(xml).into_iter().collect();
        assert_eq!(names, vec!["PL_CORE", "PL_NEW", "PL_SHARED"]);
    }

    #[test]
    fn cross_checks_new_index_against_new_folder() {
        let (dir, _reference, new) = setup();
        fs::write(new.join("core.plist"), CORE_NEW).unwrap();
        let reference_xml = dir.path().join("ref.xml");
        let new_xml = dir.path().join("new.xml");
        fs::write(&reference_xml, r#"<L><P n="PL_CORE"/><P n="PL_OLD"/></L>"#).unwrap();
        fs::write(&new_xml, r#"<L><P n="PL_CORE"/><P n="PL_GHOST"/></L>"#).unwrap();

        let result = compare_xml_plist(&reference_xml, &new_xml, &new, KEYWORD);
        assert_eq!(result.only_in_reference, vec!["PL_OLD"]);
        assert_eq!(result.only_in_new, vec!["PL_GHOST"]);
        assert_eq!(result.in_both, vec!["PL_CORE"]);
        assert_eq!(result.missing_from_new_dir, vec!["PL_GHOST"]);
        assert_eq!(result.unreferenced_in_new, vec!["PL_NEW", "PL_SHARED"]);
        assert!(result.plist_dir_error.is_none());
    }

    #[test]
    fn unreadable_index_is_a_load_error() {
        let (dir, _reference, new) = setup();
        let new_xml = dir.path().join("new.xml");
        fs::write(&new_xml, r#"<L><P n="PL_CORE"/></L>"#).unwrap();

        let result = compare_xml_plist(&dir.path().join("absent.xml"), &new_xml, &new, KEYWORD);
        assert!(result.load_error_reference.is_some());
        assert_eq!(result.only_in_new, vec!["PL_CORE"]);
        assert_eq!(result.missing_from_new_dir, vec!["PL_CORE"]);

        let result = compare_xml_plist(&new_xml, &new_xml, &dir.path().join("absent"), KEYWORD);
        assert!(result.plist_dir_error.is_some());
        assert!(result.missing_from_new_dir.is_empty());
    }
}
