//! Action pipeline for autosort.
//!
//! This crate runs the actions of matching rules against the filesystem
//! (move, copy, rename, delete), reports each outcome as an
//! [`ExecutionResult`], and records applied mutations in an [`UndoManager`]
//! so they can be reversed later.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use autosort_core::{FileDescriptor, OrganizeConfig};
//! use autosort_ops::{RuleExecutor, UndoManager};
//! use autosort_rules::{Action, Condition, Rule};
//!
//! let undo = Arc::new(UndoManager::default());
//! let executor = RuleExecutor::new(Arc::clone(&undo));
//! let rules = vec![
//!     Rule::new("Invoices")
//!         .when(Condition::name_contains("invoice"))
//!         .then(Action::move_to("/home/me/Finance/{year}")),
//! ];
//!
//! let file = FileDescriptor::from_path("/home/me/Downloads/invoice-42.pdf").unwrap();
//! let report = executor.execute(&rules, &file, &OrganizeConfig::new());
//! for line in &report.log {
//!     println!("{line}");
//! }
//! undo.undo_last().unwrap();
//! ```

mod action;
mod batch;
mod conflict;
mod copy;
mod delete;
mod executor;
mod move_op;
mod rename;
mod result;
mod undo;

pub use action::ActionExt;
pub use batch::{collect_files, organize_folder};
pub use conflict::auto_rename_path;
pub use executor::{ExecutionReport, RuleExecutor};
pub use rename::validate_filename;
pub use result::{ActionMeta, ExecutionResult};
pub use undo::{DEFAULT_UNDO_CAPACITY, UndoEntry, UndoError, UndoManager, UndoStatus};
