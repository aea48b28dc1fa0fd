use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tpmig_apply::{ChangeLog, MigrationApplier, TextAnchors};
use tpmig_config::{load_config, resolve_paths, validate_paths, MigrationConfig};
use tpmig_diff::{
    check_duplicates, compare_directory_pairs, compare_env, compare_flat, compare_instances,
    compare_keyed_by_name, compare_named_entries, compare_plist_folders, compare_xml_plist,
    patmod_names, FilenameFilter,
};
use tpmig_types::{
    ConsistencyIssue, DiffResult, DirectoryDiff, EnvDiff, IssueKind, MtplDiff, NamedEntry,
    PatchAction, PathEntry, PlistFolderDiff, ResolvedPaths, TreeChange, XmlPlistDiff,
};
use tracing::debug;

use crate::cli::*;

const PREVIEW_WIDTH: usize = 96;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let mut project = Project::new(cli.config);
    let format = cli.format;
    match cli.command {
        Command::Paths => cmd_paths(&mut project, format),
        Command::Compare(args) => cmd_compare(&mut project, args.target, format),
        Command::Apply(args) => cmd_apply(&mut project, args, format),
        Command::Changelog(args) => cmd_changelog(&mut project, args, format),
    }
}

/// The project file, read on first use.
struct Project {
    path: PathBuf,
    loaded: Option<Loaded>,
}

struct Loaded {
    config: MigrationConfig,
    resolved: ResolvedPaths,
    base_dir: PathBuf,
}

impl Project {
    fn new(path: PathBuf) -> Self {
        Self { path, loaded: None }
    }

    fn get(&mut self) -> anyhow::Result<&Loaded> {
        let loaded = match self.loaded.take() {
            Some(loaded) => loaded,
            None => {
                let config = load_config(&self.path)
                    .with_context(|| format!("reading project file {}", self.path.display()))?;
                let base_dir = self
                    .path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .unwrap_or_else(|| Path::new("."))
                    .to_path_buf();
                Loaded {
                    resolved: resolve_paths(&config),
                    config,
                    base_dir,
                }
            }
        };
        Ok(self.loaded.insert(loaded))
    }

    /// `explicit` if given, else the configured path under `key`.
    fn pick(&mut self, explicit: Option<PathBuf>, key: &str) -> anyhow::Result<PathBuf> {
        match explicit {
            Some(path) => Ok(path),
            None => Ok(self.get()?.resolved.require(key)?.to_path_buf()),
        }
    }

    /// The configured path under `key`, or `None` when there is no project
    /// file or the path is not configured.
    fn optional(&mut self, key: &str) -> anyhow::Result<Option<PathBuf>> {
        if self.loaded.is_none() && !self.path.exists() {
            return Ok(None);
        }
        Ok(self.get()?.resolved.require(key).ok().map(Path::to_path_buf))
    }

    /// A value read from the project file, or its default when there is none.
    fn config_or_default<T: Default>(
        &mut self,
        read: impl FnOnce(&MigrationConfig) -> T,
    ) -> anyhow::Result<T> {
        if self.loaded.is_none() && !self.path.exists() {
            return Ok(T::default());
        }
        Ok(read(&self.get()?.config))
    }

    fn patmod_patterns(&mut self) -> anyhow::Result<Vec<String>> {
        self.config_or_default(|config| config.patmod_patterns.clone())
    }

    fn anchors(&mut self) -> anyhow::Result<TextAnchors> {
        self.config_or_default(|config| config.anchors.clone())
    }

    /// Configured MTPL instance names and name patterns.
    fn mtpl_selection(&mut self) -> anyhow::Result<(Vec<String>, Vec<String>)> {
        self.config_or_default(|config| {
            (config.mtpl_instances.clone(), config.mtpl_instance_patterns.clone())
        })
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_paths(project: &mut Project, format: OutputFormat) -> anyhow::Result<()> {
    let status = validate_paths(&project.get()?.resolved);
    if format == OutputFormat::Json {
        return print_json(&status);
    }

    for (key, entry) in &status {
        let mark = if entry.exists { "✓".green() } else { "✗".red() };
        let shown = if entry.path.as_os_str().is_empty() {
            "(not configured)".dimmed().to_string()
        } else {
            entry.path.display().to_string()
        };
        println!("{} {} {}", mark, format!("{key:<20}").bold(), shown);
    }
    Ok(())
}

fn cmd_compare(
    project: &mut Project,
    target: CompareTarget,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match target {
        CompareTarget::Shmoo(pair) => {
            let reference = project.pick(pair.reference, "ref_shmoo_config")?;
            let new = project.pick(pair.new, "new_shmoo_config")?;
            let result = compare_flat(&reference, &new);
            match format {
                OutputFormat::Json => print_json(&result),
                OutputFormat::Text => {
                    print_diff(&result, Value::to_string);
                    Ok(())
                }
            }
        }
        CompareTarget::Patmod(args) => {
            let reference = project.pick(args.pair.reference, "ref_patmod_file")?;
            let new = project.pick(args.pair.new, "new_patmod_file")?;
            let patterns = if args.patterns.is_empty() {
                project.patmod_patterns()?
            } else {
                args.patterns
            };
            debug!(?patterns, "patmod name patterns");
            let result = compare_named_entries(&reference, &new, &patterns);
            match format {
                OutputFormat::Json => print_json(&result),
                OutputFormat::Text => {
                    print_diff(&result, render_entry);
                    Ok(())
                }
            }
        }
        CompareTarget::Utp(args) => {
            let reference = project.pick(args.pair.reference, "ref_utp_setpoints")?;
            let new = project.pick(args.pair.new, "new_utp_setpoints")?;
            let names = if args.no_check {
                None
            } else {
                let patmod = match args.patmod {
                    Some(path) => Some(path),
                    None => project.optional("new_patmod_file")?,
                };
                patmod.map(|path| patmod_names(&path))
            };
            let (result, issues) = compare_keyed_by_name(&reference, &new, names.as_ref());
            match format {
                OutputFormat::Json => print_json(&KeyedReport {
                    diff: &result,
                    issues: &issues,
                }),
                OutputFormat::Text => {
                    print_diff(&result, Value::to_string);
                    print_issues(&issues);
                    Ok(())
                }
            }
        }
        CompareTarget::Defeature(pair) => {
            let reference = project.pick(pair.reference, "ref_input_files")?;
            let new = project.pick(pair.new, "new_input_files")?;
            let result =
                compare_directory_pairs(&reference, &new, &FilenameFilter::defeature_tracking());
            match format {
                OutputFormat::Json => print_json(&result),
                OutputFormat::Text => {
                    print_directory_diff(&result);
                    Ok(())
                }
            }
        }
        CompareTarget::Env(pair) => {
            let reference = project.pick(pair.reference, "ref_env_file")?;
            let new = project.pick(pair.new, "new_env_file")?;
            let result = compare_env(&reference, &new, &project.anchors()?.path_block);
            match format {
                OutputFormat::Json => print_json(&result),
                OutputFormat::Text => {
                    print_env_diff(&result);
                    Ok(())
                }
            }
        }
        CompareTarget::Plist(pair) => {
            let reference = project.pick(pair.reference, "ref_supersede_plist")?;
            let new = project.pick(pair.new, "new_supersede_plist")?;
            let keyword = project.anchors()?.block_keyword;
            let folders = compare_plist_folders(&reference, &new, &keyword);
            let duplicates = check_duplicates(&new, &keyword);
            match format {
                OutputFormat::Json => print_json(&PlistReport {
                    folders: &folders,
                    duplicates_in_new: &duplicates,
                }),
                OutputFormat::Text => {
                    print_plist_diff(&folders, &duplicates);
                    Ok(())
                }
            }
        }
        CompareTarget::XmlPlist(args) => {
            let reference = project.pick(args.pair.reference, "ref_plist_xml")?;
            let new = project.pick(args.pair.new, "new_plist_xml")?;
            let plist_dir = project.pick(args.plist_dir, "new_supersede_plist")?;
            let keyword = project.anchors()?.block_keyword;
            let result = compare_xml_plist(&reference, &new, &plist_dir, &keyword);
            match format {
                OutputFormat::Json => print_json(&result),
                OutputFormat::Text => {
                    print_xml_plist_diff(&result);
                    Ok(())
                }
            }
        }
        CompareTarget::Mtpl(args) => {
            let reference = project.pick(args.pair.reference, "ref_mtpl_file")?;
            let new = project.pick(args.pair.new, "new_mtpl_file")?;
            let (names, patterns) = if args.instances.is_empty() && args.patterns.is_empty() {
                project.mtpl_selection()?
            } else {
                (args.instances, args.patterns)
            };
            debug!(?names, ?patterns, "MTPL instance selection");
            let result = compare_instances(&reference, &new, &names, &patterns);
            match format {
                OutputFormat::Json => print_json(&result),
                OutputFormat::Text => {
                    print_mtpl_diff(&result);
                    Ok(())
                }
            }
        }
    }
}

#[derive(Serialize)]
struct KeyedReport<'a> {
    diff: &'a DiffResult,
    issues: &'a [ConsistencyIssue],
}

#[derive(Serialize)]
struct PlistReport<'a> {
    folders: &'a PlistFolderDiff,
    duplicates_in_new: &'a BTreeMap<String, Vec<String>>,
}

fn render_entry(entry: &NamedEntry) -> String {
    serde_json::to_string(&entry.entry).unwrap_or_default()
}

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_WIDTH {
        return text.to_string();
    }
    let cut: String = text.chars().take(PREVIEW_WIDTH).collect();
    format!("{cut}...")
}

fn print_diff<V>(result: &DiffResult<V>, render: impl Fn(&V) -> String) {
    println!("{} {}", "ref:".dimmed(), result.reference_path.display());
    println!("{} {}", "new:".dimmed(), result.new_path.display());
    if let Some(err) = &result.load_error_reference {
        println!("{} {}", "✗ reference:".red().bold(), err);
    }
    if let Some(err) = &result.load_error_new {
        println!("{} {}", "✗ new:".red().bold(), err);
    }
    if result.has_load_error() {
        return;
    }

    for item in &result.only_in_reference {
        println!(
            "  {} {}  {}",
            "-".red().bold(),
            item.key.bold(),
            preview(&render(&item.ref_value)).dimmed()
        );
    }
    for item in &result.only_in_new {
        println!(
            "  {} {}  {}",
            "+".green().bold(),
            item.key.bold(),
            preview(&render(&item.new_value)).dimmed()
        );
    }
    for item in &result.different {
        println!("  {} {}", "~".yellow().bold(), item.key.bold());
        println!("      ref: {}", preview(&render(&item.ref_value)));
        println!("      new: {}", preview(&render(&item.new_value)));
    }

    let stats = &result.stats;
    if let (Some(reference), Some(new)) = (stats.reference_matched, stats.new_matched) {
        println!(
            "{}",
            format!(
                "Pattern filter kept {reference}/{} reference and {new}/{} new entries.",
                stats.reference_total, stats.new_total
            )
            .dimmed()
        );
    }
    println!(
        "{} only in reference, {} only in new, {} different, {} identical",
        result.only_in_reference.len().to_string().red(),
        result.only_in_new.len().to_string().green(),
        result.different.len().to_string().yellow(),
        result.identical.len()
    );
    if result.is_clean() {
        println!("{} No differences.", "✓".green().bold());
    }
}

fn print_issues(issues: &[ConsistencyIssue]) {
    if issues.is_empty() {
        return;
    }
    println!("{}", "Consistency issues:".red().bold());
    for issue in issues {
        let missing = match issue.issue_kind {
            IssueKind::ConfigurationNotFound => &issue.configuration_reference,
            IssueKind::ElementNotFound => &issue.element_name,
        };
        println!(
            "  {} {}: {} ({})",
            "!".red(),
            issue.utp_entry_name.bold(),
            missing.yellow(),
            issue.issue_kind
        );
    }
}

fn print_change(change: &TreeChange) {
    match change {
        TreeChange::Added { path, new_value } => {
            println!("      {} {} = {}", "+".green(), path, preview(&new_value.to_string()));
        }
        TreeChange::Removed { path, ref_value } => {
            println!("      {} {} = {}", "-".red(), path, preview(&ref_value.to_string()));
        }
        TreeChange::Changed {
            path,
            ref_value,
            new_value,
        } => {
            println!(
                "      {} {}: {} -> {}",
                "~".yellow(),
                path,
                preview(&ref_value.to_string()),
                preview(&new_value.to_string())
            );
        }
    }
}

fn print_directory_diff(result: &DirectoryDiff) {
    println!("{} {}", "ref:".dimmed(), result.reference_dir.display());
    println!("{} {}", "new:".dimmed(), result.new_dir.display());
    if let Some(err) = &result.reference_error {
        println!("{} {}", "✗ reference:".red().bold(), err);
    }
    if let Some(err) = &result.new_error {
        println!("{} {}", "✗ new:".red().bold(), err);
    }

    for name in &result.files_only_in_reference {
        println!("  {} {}", "-".red().bold(), name);
    }
    for name in &result.files_only_in_new {
        println!("  {} {}", "+".green().bold(), name);
    }
    for pair in &result.files_in_both {
        if let Some(err) = &pair.error {
            println!("  {} {}  {}", "✗".red(), pair.filename.bold(), err);
        } else if pair.identical {
            println!("  {} {}", "=".dimmed(), pair.filename.dimmed());
        } else {
            println!(
                "  {} {} ({} changes)",
                "~".yellow().bold(),
                pair.filename.bold(),
                pair.changes.len()
            );
            for change in &pair.changes {
                print_change(change);
            }
        }
    }
}

fn print_sides(
    reference: &Path,
    new: &Path,
    reference_error: Option<&String>,
    new_error: Option<&String>,
) {
    println!("{} {}", "ref:".dimmed(), reference.display());
    println!("{} {}", "new:".dimmed(), new.display());
    if let Some(err) = reference_error {
        println!("{} {}", "✗ reference:".red().bold(), err);
    }
    if let Some(err) = new_error {
        println!("{} {}", "✗ new:".red().bold(), err);
    }
}

fn print_env_diff(result: &EnvDiff) {
    print_sides(
        &result.reference_path,
        &result.new_path,
        result.load_error_reference.as_ref(),
        result.load_error_new.as_ref(),
    );
    let show = |mark: colored::ColoredString, entry: &PathEntry| {
        println!("  {} {}  {}", mark, entry.path, entry.kind.to_string().dimmed());
    };
    for entry in &result.only_in_reference {
        show("-".red().bold(), entry);
    }
    for entry in &result.only_in_new {
        show("+".green().bold(), entry);
    }
    println!(
        "{} only in reference, {} only in new, {} in both",
        result.only_in_reference.len().to_string().red(),
        result.only_in_new.len().to_string().green(),
        result.in_both.len()
    );
}

fn print_plist_diff(result: &PlistFolderDiff, duplicates: &BTreeMap<String, Vec<String>>) {
    print_sides(
        &result.reference_dir,
        &result.new_dir,
        result.reference_error.as_ref(),
        result.new_error.as_ref(),
    );
    for name in &result.files_only_in_reference {
        println!("  {} {}", "-".red().bold(), name);
    }
    for name in &result.files_only_in_new {
        println!("  {} {}", "+".green().bold(), name);
    }
    for file in &result.files_in_both {
        if let Some(err) = &file.error {
            println!("  {} {}  {}", "✗".red(), file.filename.bold(), err);
            continue;
        }
        if file.only_in_reference.is_empty()
            && file.only_in_new.is_empty()
            && file.different.is_empty()
        {
            println!("  {} {}", "=".dimmed(), file.filename.dimmed());
            continue;
        }
        println!("  {} {}", "~".yellow().bold(), file.filename.bold());
        for name in &file.only_in_reference {
            println!("      {} {}", "-".red(), name);
        }
        for name in &file.only_in_new {
            println!("      {} {}", "+".green(), name);
        }
        for block in &file.different {
            println!("      {} {}", "~".yellow(), block.name);
        }
    }
    if !duplicates.is_empty() {
        println!("{}", "Repeated plist names in new files:".red().bold());
        for (filename, names) in duplicates {
            println!("  {} {}: {}", "!".red(), filename.bold(), names.join(", ").yellow());
        }
    }
}

fn print_xml_plist_diff(result: &XmlPlistDiff) {
    print_sides(
        &result.reference_xml,
        &result.new_xml,
        result.load_error_reference.as_ref(),
        result.load_error_new.as_ref(),
    );
    for name in &result.only_in_reference {
        println!("  {} {}", "-".red().bold(), name);
    }
    for name in &result.only_in_new {
        println!("  {} {}", "+".green().bold(), name);
    }
    if let Some(err) = &result.plist_dir_error {
        println!("{} {}", "✗ plist folder:".red().bold(), err);
    }
    for name in &result.missing_from_new_dir {
        println!("  {} {} {}", "!".red(), name.bold(), "(no block in new folder)".dimmed());
    }
    for name in &result.unreferenced_in_new {
        println!("  {} {} {}", "?".yellow(), name, "(not in new index)".dimmed());
    }
    println!(
        "{} only in reference, {} only in new, {} in both, {} missing from new folder",
        result.only_in_reference.len().to_string().red(),
        result.only_in_new.len().to_string().green(),
        result.in_both.len(),
        result.missing_from_new_dir.len().to_string().red()
    );
}

fn print_mtpl_diff(result: &MtplDiff) {
    print_sides(
        &result.reference_path,
        &result.new_path,
        result.load_error_reference.as_ref(),
        result.load_error_new.as_ref(),
    );
    if result.resolved_names.is_empty() {
        println!("No MTPL instances selected.");
        return;
    }
    for name in &result.only_in_reference {
        println!("  {} {}", "-".red().bold(), name.bold());
    }
    for name in &result.only_in_new {
        println!("  {} {}", "+".green().bold(), name.bold());
    }
    for name in &result.not_found {
        println!("  {} {} {}", "?".yellow(), name, "(in neither file)".dimmed());
    }
    let absent = || "(absent)".to_string();
    for instance in &result.different {
        println!("  {} {} {}", "~".yellow().bold(), instance.name.bold(), instance.kind);
        for key in &instance.diff_keys {
            println!(
                "      {}: {} -> {}",
                key,
                instance.ref_fields.get(key).cloned().unwrap_or_else(absent),
                instance.new_fields.get(key).cloned().unwrap_or_else(absent)
            );
        }
    }
    println!(
        "{} only in reference, {} only in new, {} different, {} identical, {} not found",
        result.only_in_reference.len().to_string().red(),
        result.only_in_new.len().to_string().green(),
        result.different.len().to_string().yellow(),
        result.identical.len(),
        result.not_found.len()
    );
}

fn cmd_apply(project: &mut Project, args: ApplyArgs, format: OutputFormat) -> anyhow::Result<()> {
    let raw = fs::read_to_string(&args.actions)
        .with_context(|| format!("reading {}", args.actions.display()))?;
    let actions: Vec<Value> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing action list {}", args.actions.display()))?;

    let loaded = project.get()?;
    let mut applier = MigrationApplier::new(loaded.config.applier_config(&loaded.base_dir));
    let report = applier.apply_json_batch(&actions, &loaded.resolved);

    if format == OutputFormat::Json {
        return print_json(&report);
    }
    for (action, result) in actions.iter().zip(&report.results) {
        let kind = PatchAction::deserialize(action).map_or("invalid", |a| a.kind());
        let mark = if result.succeeded {
            "✓".green().bold()
        } else {
            "✗".red().bold()
        };
        println!("{} {} {}", mark, format!("{kind:<18}").cyan(), result.message);
        if let Some(backup) = &result.backup_path {
            println!("    {} {}", "backup:".dimmed(), backup.display());
        }
    }
    println!("\n{}", report.summary().bold());
    if let Some(folder) = &report.backup_folder {
        println!("Backups: {}", folder.display().to_string().yellow());
    }
    Ok(())
}

fn cmd_changelog(
    project: &mut Project,
    args: ChangelogArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let loaded = project.get()?;
    let log = ChangeLog::new(loaded.config.applier_config(&loaded.base_dir).change_log_path);
    let entries = log.recent(args.limit);

    if format == OutputFormat::Json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("No changes recorded in {}.", log.path().display());
        return Ok(());
    }
    for entry in &entries {
        println!(
            "{} {} {} {}",
            entry.timestamp.dimmed(),
            entry.session_id.yellow(),
            entry.action_kind.cyan(),
            entry.description
        );
        for path in &entry.affected_file_paths {
            println!("    {}", path.display());
        }
    }
    Ok(())
}
