//! # faktura – invoice markup → PDF rendering pipeline
//!
//! This crate converts a small XML-like invoice markup language plus a JSON
//! data record into reproducible PDF documents. The pipeline stages are:
//!
//! 1. **Parse** – markup string → template node tree ([`markup`])
//! 2. **Bind** – resolve `data-field` paths against the record, expanding
//!    repeated rows and sections ([`binding`], [`record`], [`totals`])
//! 3. **Layout** – block flow with pagination into positioned boxes
//!    ([`layout`], [`fonts`], [`document`])
//! 4. **Emit** – serialise pages to PDF bytes via lopdf ([`pdf`])
//!
//! Every stage is pure: the same (template, record, config) triple always
//! yields byte-identical output.

pub mod binding;
pub mod document;
pub mod error;
pub mod fonts;
pub mod layout;
pub mod markup;
pub mod pdf;
pub mod pipeline;
pub mod record;
pub mod style;
pub mod templates;
pub mod totals;

// Re-exports for convenience
pub use error::{RenderError, Result};
pub use pipeline::{render, render_document, PageConfig};
