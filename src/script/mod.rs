//! Scene-script grammar.
//!
//! Scripts are line-oriented; each non-blank line is one [`Command`]. See [`parse_script`].

/// Typed commands.
pub mod command;
/// Line matcher for the closed command grammar.
pub mod parser;

pub use command::{Command, ScriptLine};
pub use parser::{parse_line, parse_script};
