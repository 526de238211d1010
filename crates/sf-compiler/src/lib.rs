//! ShieldForge Filter List Compiler
//!
//! This crate compiles ABP/uBO filter lists into declarative engine rules,
//! cosmetic rules and scriptlet directives, and merges per-list output into
//! one priority-ordered, budget-bounded rule set.

pub mod assembler;
pub mod cosmetic;
pub mod options;
pub mod parser;
pub mod sequence;

pub use assembler::{assemble_rules, build_update, prioritize_rules, AssembleStats};
pub use options::{parse_options, ParsedOptions};
pub use parser::{classify_line, parse_filter_list, FilterParser, LineKind, ParsedList, RuleError};
pub use sequence::RuleIdSequence;
