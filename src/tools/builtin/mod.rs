// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Builtin tools
//!
//! Fixed local implementations, identified by name:
//! `fs_read_file`, `fs_read_dir`, `fs_find_files`, `eval_js`,
//! `web_request`. `web_search` belongs to the catalog but is
//! provider-native and has no local implementation.
//!
//! Groups expand a `@group` reference to several tools at once.

pub mod eval;
pub mod fs_find_files;
pub mod fs_read_dir;
pub mod fs_read_file;
pub mod web_request;

pub use eval::EvalPolicy;

use crate::tools::definition::BuiltinTool;

/// Name of the provider-native search tool; part of the catalog but bound
/// by the backend, not implemented locally.
pub const WEB_SEARCH: &str = "web_search";

/// Builtin groups addressable as `@<group>`.
pub const GROUPS: &[(&str, &[&str])] = &[
    ("fs", &[fs_read_file::NAME, fs_read_dir::NAME, fs_find_files::NAME]),
    ("web", &[web_request::NAME, WEB_SEARCH]),
    ("eval", &[eval::NAME]),
];

/// Look up a group's member names.
pub fn group(name: &str) -> Option<&'static [&'static str]> {
    GROUPS
        .iter()
        .find(|(group_name, _)| *group_name == name)
        .map(|(_, members)| *members)
}

/// Names of all defined groups, for error messages.
pub fn group_names() -> Vec<&'static str> {
    GROUPS.iter().map(|(name, _)| *name).collect()
}

/// Look up a builtin's definition by name. `web_search` is not included;
/// it has no local surface.
pub fn find(name: &str) -> Option<BuiltinTool> {
    match name {
        fs_read_file::NAME => Some(fs_read_file::definition()),
        fs_read_dir::NAME => Some(fs_read_dir::definition()),
        fs_find_files::NAME => Some(fs_find_files::definition()),
        eval::NAME => Some(eval::definition()),
        web_request::NAME => Some(web_request::definition()),
        _ => None,
    }
}
