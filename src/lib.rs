//! The library code for the `minori` wiki generator. A build reads a tree of
//! markdown notes and writes a categorized static site:
//!
//! 1. Finding the notes under the source directory ([`crate::discover`])
//! 2. Parsing each note, one at a time: its header ([`crate::frontmatter`]),
//!    its math blocks ([`crate::math`]) and its markdown body
//!    ([`crate::markdown`])
//! 3. Grouping the pages into categories in the order they were found
//!    ([`crate::page`])
//! 4. Rendering the index and every page through the theme's templates and
//!    writing them to disk ([`crate::template`], [`crate::write`])
//!
//! Independently of the notes, the theme assets, static files and raw sources
//! are mirrored into the site ([`crate::sync`]) and the changelog page is
//! built from the git history ([`crate::changelog`]). [`crate::build`] runs
//! all of it and waits for every write before reporting.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod changelog;
pub mod config;
pub mod discover;
pub mod frontmatter;
pub mod htmlrenderer;
pub mod markdown;
pub mod math;
pub mod note;
pub mod page;
pub mod spacing;
pub mod sync;
pub mod template;
pub mod util;
pub mod write;
