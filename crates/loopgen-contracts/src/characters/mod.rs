mod builtin;
mod catalog;

pub use catalog::{ActionSpec, Character, CharacterCatalog};
