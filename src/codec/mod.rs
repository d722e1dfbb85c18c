//! Text formats on both sides of a sync pair.
//!
//! ## Key Components
//!
//! - [`bibtex`] - BibTeX reader and writer. Entries keep their field order and raw value text,
//!   everything that is not an entry (`@comment`, `@string`, `@preamble`, free text) is carried
//!   through verbatim.
//! - [`md`] - Top-level block structure of a markdown document ([`MdTree`]) with the source line
//!   span of every block, including Pandoc/Quarto `:::` divs.
//!
//! Neither codec rewrites text it does not own: the markdown side is edited by splicing raw lines
//! (see [`crate::document`]), and the BibTeX writer only normalises the layout of entry blocks.
//!
//! ```rust
//! use bibnote_core::codec::{md::MdTree, bibtex::parse_bibtex};
//!
//! let tree = MdTree::parse("### Title\n<br>@key\n\n::: notes\nhello\n:::\n");
//! assert_eq!(tree.len(), 3);
//!
//! let items = parse_bibtex("@misc{key, title = {Title}}").unwrap();
//! assert_eq!(items.len(), 1);
//! ```

pub mod bibtex;
pub mod md;

pub use md::{MdNode, MdTree, NodeKind};
