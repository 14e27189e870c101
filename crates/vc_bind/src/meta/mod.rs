//! Binding directives and the strategies that read them.
//!
//! ## Menu
//!
//! - [`Directive`] / [`DirectiveKind`]: what can be said about a declaration.
//! - [`MetadataReader`]: where directives come from.
//! - [`InlineReader`]: directives registered with the declarations.
//! - [`OverrideReader`] + [`MetadataTable`]: an external table overriding another reader.

// -----------------------------------------------------------------------------
// Modules

mod directive;
mod inline;
mod reader;
mod table;

// -----------------------------------------------------------------------------
// Exports

pub use directive::{Directive, DirectiveKind};
pub use inline::InlineReader;
pub use reader::MetadataReader;
pub use table::{ClassEntry, MetadataTable, OverrideReader};
