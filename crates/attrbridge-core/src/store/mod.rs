// ── Node storage ──
//
// The concurrent node map and the value-level operations applied to it.

mod refresh;
mod tree;

pub use tree::{NamespaceTree, normalize_path};
