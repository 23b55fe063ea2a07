//! Cell transformer implementations

mod title_case;

pub use title_case::{TitleCase, title_case};
