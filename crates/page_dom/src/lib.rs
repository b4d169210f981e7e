#![allow(
    clippy::missing_docs_in_private_items,
    reason = "Internal implementation details don't need public documentation"
)]
#![allow(
    clippy::missing_inline_in_public_items,
    reason = "Inlining decisions left to compiler for this crate"
)]

mod dom;
mod parser;
mod printing;
mod selectors;

pub use dom::{DomError, DomNode, Document, MutationRecord, NodeKind};
pub use indextree::NodeId;
