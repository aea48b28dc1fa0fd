//! Pure text transforms behind the free-text patch operations.
//!
//! Each function takes the current file content and returns the new content,
//! or `None` (or a specific miss) when its anchor is not found. Nothing here
//! touches the filesystem.

use regex::{Captures, Regex};

use crate::config::TextAnchors;
use crate::error::Result;

/// Format a pattern-path line the way env files list them:
/// `"\\<path>;" +`, indented with four tabs. Leading backslashes of `entry`
/// are normalized to exactly two.
pub fn format_path_line(entry: &str) -> String {
    format!("\t\t\t\t\"\\\\{};\" +\n", entry.trim_start_matches('\\'))
}

/// Insert `line` at the start of the line holding the quoted placeholder
/// token, or, failing that, right before the `;` that closes the path block.
pub fn insert_path_line(
    content: &str,
    line: &str,
    anchors: &TextAnchors,
) -> Result<Option<String>> {
    let placeholder = format!("\"{}\"", anchors.placeholder_token);
    if let Some(pos) = content.find(&placeholder) {
        let line_start = content[..pos].rfind('\n').map_or(0, |i| i + 1);
        return Ok(Some(splice_at(content, line_start, line)));
    }

    let block_end = Regex::new(&format!(
        r"(?s){}\s*=.+?(;[ \t\r]*(?:\n|$))",
        regex::escape(&anchors.path_block)
    ))?;
    Ok(block_end
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|semi| splice_at(content, semi.start(), line)))
}

/// The text of the named block `<keyword> <name> ... } ... #end`, through
/// the end of the `#end` line.
pub fn extract_named_block<'a>(
    content: &'a str,
    keyword: &str,
    name: &str,
) -> Result<Option<&'a str>> {
    let pattern = Regex::new(&format!(
        r"{}\s+{}\b(?s:.+?)\}}[^\n]*#end[^\n]*",
        regex::escape(keyword),
        regex::escape(name)
    ))?;
    Ok(pattern.find(content).map(|m| m.as_str()))
}

/// Append `block` after a blank line, ending the file with a newline.
pub fn append_block(content: &str, block: &str) -> String {
    format!("{}\n\n{}\n", content.trim_end(), block)
}

/// Splice a patmod entry block into the entry array of `target`.
///
/// The block goes after the last `}` preceding the final `]`, with a
/// separating comma; an array with no entries gets the block alone. `None`
/// when `target` has no `]`.
pub fn splice_array_entry(target: &str, block: &str) -> Option<String> {
    let close = target.rfind(']')?;
    let spliced = match target[..close].rfind('}') {
        Some(last) => format!("{},\n    {}{}", &target[..=last], block, &target[last + 1..]),
        None => format!("{}    {}\n{}", &target[..close], block, &target[close..]),
    };
    Some(spliced)
}

/// Outcome of [`replace_field_value`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldEdit {
    /// The whole content with the field rewritten.
    Updated(String),
    /// No instance block with that name.
    NoInstance,
    /// The instance exists but has no such field line.
    NoField,
}

/// Within the instance block `<keyword> [<type>] <instance> { ... \n}`, set
/// the first `field = <value>;` line to `value`, keeping its indentation.
pub fn replace_field_value(
    content: &str,
    keywords: &[String],
    instance: &str,
    field: &str,
    value: &str,
) -> Result<FieldEdit> {
    let keywords = keywords
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    let block_re = Regex::new(&format!(
        r"\b(?:{keywords})\s+(?:\S+\s+)?{}\s*\{{(?s:.+?)\n\}}",
        regex::escape(instance)
    ))?;
    let Some(block) = block_re.find(content) else {
        return Ok(FieldEdit::NoInstance);
    };

    let field_re = Regex::new(&format!(
        r"(?m)^([ \t]*{}\s*=\s*)[^;\n]+;",
        regex::escape(field)
    ))?;
    if !field_re.is_match(block.as_str()) {
        return Ok(FieldEdit::NoField);
    }
    let updated = field_re.replacen(block.as_str(), 1, |caps: &Captures| {
        format!("{}{};", &caps[1], value)
    });

    Ok(FieldEdit::Updated(format!(
        "{}{}{}",
        &content[..block.start()],
        updated,
        &content[block.end()..]
    )))
}

fn splice_at(content: &str, at: usize, insert: &str) -> String {
    let mut out = String::with_capacity(content.len() + insert.len());
    out.push_str(&content[..at]);
    out.push_str(insert);
    out.push_str(&content[at..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENV: &str = "HDST_PAT_PATH = \"\" +\n\t\t\t\t\"\\\\srv\\pats\\a;\" +\n\t\t\t\t\"$TORCH_AUTO_PAT_PATH\";\nOTHER = 1;\n";

    #[test]
    fn path_line_format() {
        assert_eq!(
            format_path_line(r"\\srv\pats\new"),
            "\t\t\t\t\"\\\\srv\\pats\\new;\" +\n"
        );
        assert_eq!(format_path_line(r"srv\x"), format_path_line(r"\\srv\x"));
    }

    #[test]
    fn inserts_before_placeholder_line() {
        let line = format_path_line(r"srv\pats\b");
        let out = insert_path_line(ENV, &line, &TextAnchors::default())
            .unwrap()
            .unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[2], "\t\t\t\t\"\\\\srv\\pats\\b;\" +");
        assert_eq!(lines[3], "\t\t\t\t\"$TORCH_AUTO_PAT_PATH\";");
    }

    #[test]
    fn falls_back_to_block_terminator() {
        let content = "X = 2;\nHDST_PAT_PATH = \"a\" +\n\"b\";\nY = 1;\n";
        let out = insert_path_line(content, "NEW", &TextAnchors::default())
            .unwrap()
            .unwrap();
        assert_eq!(out, "X = 2;\nHDST_PAT_PATH = \"a\" +\n\"b\"NEW;\nY = 1;\n");
    }

    #[test]
    fn no_anchor_no_insert() {
        assert!(insert_path_line("A = 1;\n", "NEW", &TextAnchors::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn extracts_block_through_end_marker() {
        let plist = "GlobalPList PL_A [opt]\n{\n  Pat a;\n} # PL_A #end\nGlobalPList PL_AB\n{\n} #end\n";
        let block = extract_named_block(plist, "GlobalPList", "PL_A").unwrap().unwrap();
        assert_eq!(block, "GlobalPList PL_A [opt]\n{\n  Pat a;\n} # PL_A #end");
        assert!(extract_named_block(plist, "GlobalPList", "PL_C").unwrap().is_none());
    }

    #[test]
    fn name_boundary_is_respected() {
        let plist = "GlobalPList PL_AB\n{\n} #end\n";
        assert!(extract_named_block(plist, "GlobalPList", "PL_A").unwrap().is_none());
    }

    #[test]
    fn append_block_separates_with_blank_line() {
        assert_eq!(append_block("a\n\n\n", "B"), "a\n\nB\n");
    }

    #[test]
    fn splices_after_last_entry() {
        let target = "[\n    {\"Name\": \"A\"}\n]\n";
        let out = splice_array_entry(target, "/* c */\n{\"Name\": \"B\"}").unwrap();
        assert_eq!(out, "[\n    {\"Name\": \"A\"},\n    /* c */\n{\"Name\": \"B\"}\n]\n");
    }

    #[test]
    fn splices_into_empty_array() {
        assert_eq!(splice_array_entry("[]", "{}").unwrap(), "[    {}\n]");
        assert!(splice_array_entry("{\"Name\": \"A\"}", "{}").is_none());
    }

    const MTPL: &str = "Test iCVminTC SCN_CORE\n{\n    Timeout = 1;\n    Level = \"lvl\";\n}\nMultiTrialTest iCTC SCN_GT\n{\n    Timeout = 9;\n}\n";

    fn keywords() -> Vec<String> {
        TextAnchors::default().instance_keywords
    }

    fn updated(edit: FieldEdit) -> String {
        match edit {
            FieldEdit::Updated(content) => content,
            other => panic!("expected an edit, got {other:?}"),
        }
    }

    #[test]
    fn replaces_field_inside_named_instance_only() {
        let out = updated(replace_field_value(MTPL, &keywords(), "SCN_GT", "Timeout", "42").unwrap());
        assert!(out.contains("    Timeout = 1;"));
        assert!(out.contains("    Timeout = 42;"));
        assert!(!out.contains("Timeout = 9;"));
    }

    #[test]
    fn dollar_in_value_is_literal() {
        let out =
            updated(replace_field_value(MTPL, &keywords(), "SCN_CORE", "Level", "\"$1\"").unwrap());
        assert!(out.contains("    Level = \"$1\";"));
    }

    #[test]
    fn reports_which_anchor_missed() {
        assert_eq!(
            replace_field_value(MTPL, &keywords(), "NOPE", "Timeout", "1").unwrap(),
            FieldEdit::NoInstance
        );
        assert_eq!(
            replace_field_value(MTPL, &keywords(), "SCN_CORE", "Nope", "1").unwrap(),
            FieldEdit::NoField
        );
    }

    #[test]
    fn instance_without_type_token() {
        let mtpl = "MultiTrialTest SCN_MT\n{\n    Loops = 2;\n}\n";
        let out = updated(replace_field_value(mtpl, &keywords(), "SCN_MT", "Loops", "5").unwrap());
        assert_eq!(out, "MultiTrialTest SCN_MT\n{\n    Loops = 5;\n}\n");
        assert_eq!(
            replace_field_value(MTPL, &keywords(), "iCTC", "Timeout", "1").unwrap(),
            FieldEdit::NoInstance
        );
    }
}
