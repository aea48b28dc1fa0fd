use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tpmig_config::DEFAULT_CONFIG_FILE;

/// tpmig: TP migration comparison and patching.
#[derive(Parser)]
#[command(
    name = "tpmig",
    about = "Compare a reference test program against a new one and carry changes across",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Project configuration file (JSON, or TOML by extension)
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show every resolved TP path and whether it exists
    Paths,

    /// Compare one content area of the reference and new TPs
    Compare(CompareArgs),

    /// Apply a JSON list of patch actions as one backup session
    Apply(ApplyArgs),

    /// Show recent change-log records, newest first
    Changelog(ChangelogArgs),
}

#[derive(Args)]
pub struct CompareArgs {
    #[command(subcommand)]
    pub target: CompareTarget,
}

#[derive(Subcommand)]
pub enum CompareTarget {
    /// Flat key comparison of the shmoo configuration
    Shmoo(PairArgs),

    /// Named-entry comparison of the patmod file
    Patmod(PatmodArgs),

    /// Keyed comparison of UTP setpoints, checked against the new patmod names
    Utp(UtpArgs),

    /// Recursive comparison of defeature-tracking files in InputFiles
    Defeature(PairArgs),

    /// Pattern search path lists of the env files
    Env(PairArgs),

    /// Supersede `.plist` folders block by block, plus names repeated in a new file
    Plist(PairArgs),

    /// Plist XML indexes, cross-checked against the new `.plist` folder
    XmlPlist(XmlPlistArgs),

    /// Selected MTPL test instances, field by field
    Mtpl(MtplArgs),
}

/// Overrides for the configured reference and new paths.
#[derive(Args, Default)]
pub struct PairArgs {
    /// Reference-side path
    #[arg(long = "ref")]
    pub reference: Option<PathBuf>,

    /// New-side path
    #[arg(long)]
    pub new: Option<PathBuf>,
}

#[derive(Args)]
pub struct PatmodArgs {
    #[command(flatten)]
    pub pair: PairArgs,

    /// Entry name pattern; repeatable. Replaces the configured patterns.
    #[arg(short, long = "pattern")]
    pub patterns: Vec<String>,
}

#[derive(Args)]
pub struct UtpArgs {
    #[command(flatten)]
    pub pair: PairArgs,

    /// Patmod file whose names the setpoints must reference
    #[arg(long)]
    pub patmod: Option<PathBuf>,

    /// Skip the consistency check
    #[arg(long)]
    pub no_check: bool,
}

#[derive(Args)]
pub struct XmlPlistArgs {
    #[command(flatten)]
    pub pair: PairArgs,

    /// New `.plist` folder the new index is checked against
    #[arg(long)]
    pub plist_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct MtplArgs {
    #[command(flatten)]
    pub pair: PairArgs,

    /// Instance name; repeatable
    #[arg(short, long = "instance")]
    pub instances: Vec<String>,

    /// Instance name pattern, `{X}` for digits; repeatable
    #[arg(short, long = "pattern")]
    pub patterns: Vec<String>,
}

#[derive(Args)]
pub struct ApplyArgs {
    /// JSON file holding an array of patch actions
    pub actions: PathBuf,
}

#[derive(Args)]
pub struct ChangelogArgs {
    /// Maximum records to show
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_paths_with_defaults() {
        let cli = Cli::try_parse_from(["tpmig", "paths"]).unwrap();
        assert!(matches!(cli.command, Command::Paths));
        assert_eq!(cli.config, PathBuf::from("config.json"));
        assert_eq!(cli.format, OutputFormat::Text);
        assert!(!cli.verbose);
    }

    #[test]
    fn parse_compare_patmod() {
        let cli = Cli::try_parse_from([
            "tpmig",
            "compare",
            "patmod",
            "--ref",
            "/tp/ref/core.patmod.json",
            "-p",
            "CFC*",
            "--pattern",
            "^IA_",
        ])
        .unwrap();
        if let Command::Compare(CompareArgs {
            target: CompareTarget::Patmod(args),
        }) = cli.command
        {
            assert_eq!(
                args.pair.reference,
                Some(PathBuf::from("/tp/ref/core.patmod.json"))
            );
            assert!(args.pair.new.is_none());
            assert_eq!(args.patterns, vec!["CFC*", "^IA_"]);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_compare_utp() {
        let cli = Cli::try_parse_from(["tpmig", "compare", "utp", "--no-check"]).unwrap();
        if let Command::Compare(CompareArgs {
            target: CompareTarget::Utp(args),
        }) = cli.command
        {
            assert!(args.no_check);
            assert!(args.patmod.is_none());
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_apply_with_globals() {
        let cli = Cli::try_parse_from([
            "tpmig",
            "apply",
            "actions.json",
            "--config",
            "proj/tpmig.toml",
            "--format",
            "json",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("proj/tpmig.toml"));
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(cli.verbose);
        if let Command::Apply(args) = cli.command {
            assert_eq!(args.actions, PathBuf::from("actions.json"));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_changelog_limit() {
        let cli = Cli::try_parse_from(["tpmig", "changelog", "-n", "5"]).unwrap();
        if let Command::Changelog(args) = cli.command {
            assert_eq!(args.limit, 5);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_compare_xml_plist() {
        let cli = Cli::try_parse_from([
            "tpmig",
            "compare",
            "xml-plist",
            "--new",
            "new/UCCAP.all.plist.xml",
            "--plist-dir",
            "new/Supersede",
        ])
        .unwrap();
        if let Command::Compare(CompareArgs {
            target: CompareTarget::XmlPlist(args),
        }) = cli.command
        {
            assert_eq!(args.pair.new, Some(PathBuf::from("new/UCCAP.all.plist.xml")));
            assert_eq!(args.plist_dir, Some(PathBuf::from("new/Supersede")));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_compare_mtpl_selection() {
        let cli = Cli::try_parse_from([
            "tpmig", "compare", "mtpl", "-i", "SCN_A", "--instance", "SCN_B", "-p", "SCN_MT_{X}",
        ])
        .unwrap();
        if let Command::Compare(CompareArgs {
            target: CompareTarget::Mtpl(args),
        }) = cli.command
        {
            assert_eq!(args.instances, vec!["SCN_A", "SCN_B"]);
            assert_eq!(args.patterns, vec!["SCN_MT_{X}"]);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn env_and_plist_take_a_pair() {
        for target in ["env", "plist"] {
            let cli = Cli::try_parse_from(["tpmig", "compare", target, "--ref", "a"]).unwrap();
            assert!(matches!(
                cli.command,
                Command::Compare(CompareArgs {
                    target: CompareTarget::Env(_) | CompareTarget::Plist(_),
                })
            ));
        }
    }

    #[test]
    fn unknown_compare_target_is_rejected() {
        assert!(Cli::try_parse_from(["tpmig", "compare", "timing"]).is_err());
    }
}
