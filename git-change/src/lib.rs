//! Create and manage changes for the Gerrit code review tool.
//!
//! `git change` commits staged changes to a disposable local branch, uploads
//! it to Gerrit for review, and later updates, rebases, lists, submits and
//! cleans up those branches. Each change branch is named after the Change-Id
//! of the change it carries (`change-I...`).

#![warn(missing_docs)]
#![warn(
    clippy::all,
    clippy::as_conversions,
    clippy::clone_on_ref_ptr,
    clippy::dbg_macro
)]
#![allow(clippy::too_many_arguments)]

pub mod commands;
