//! Comparison engine for TP migration.
//!
//! Loads JSON-with-comments configuration files leniently and compares a
//! reference TP against a new TP, one file kind at a time. Every comparison
//! returns a result value; load failures are recorded in the result instead of
//! being raised.
//!
//! # Key Functions
//!
//! - [`compare_flat`] -- Flat key/value diff (shmoo configs)
//! - [`compare_named_entries`] -- Patmod entries by `Name`, filtered by name patterns
//! - [`compare_keyed_by_name`] -- UTP setpoints by `Name` plus a patmod consistency check
//! - [`compare_directory_pairs`] -- Defeature-tracking directories, tree-diffed per file
//! - [`diff_json_trees`] -- Recursive path-addressed JSON diff
//! - [`load_lenient`] / [`parse_lenient`] -- Comment and trailing-comma tolerant loading
//! - [`compare_env`] -- Pattern search path lists of two env files
//! - [`compare_plist_folders`] / [`check_duplicates`] -- `.plist` folders block by block
//! - [`compare_xml_plist`] -- Plist XML indexes, cross-checked against the new `.plist` folder
//! - [`compare_instances`] -- MTPL `Test`/`MultiTrialTest` instances field by field

pub mod canonical;
pub mod compare;
pub mod directory;
pub mod env;
pub mod error;
pub mod keyed_diff;
pub mod lenient;
pub mod mtpl;
pub mod patmod;
pub mod pattern;
pub mod plist;
pub mod shape;
pub mod tree_diff;

pub use canonical::{canonical_json, objects_equal, values_equal};
pub use compare::{compare_flat, compare_keyed_by_name, compare_named_entries, consistency_issues};
pub use directory::{compare_directory_pairs, FilenameFilter};
pub use env::{classify_path, compare_env, load_path_list, parse_path_list};
pub use error::{DiffError, Result};
pub use lenient::{load_lenient, parse_lenient};
pub use mtpl::{compare_instances, load_instances, parse_instances, resolve_instances};
pub use patmod::{load_named_entries, locate_entry_block, parse_named_entries, patmod_names};
pub use pattern::NamePatterns;
pub use plist::{
    check_duplicates, compare_plist_folders, compare_xml_plist, plist_blocks, plist_names,
    xml_plist_names,
};
pub use shape::{ConfigShape, ROOT_KEY};
pub use tree_diff::diff_json_trees;
