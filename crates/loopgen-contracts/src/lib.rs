pub mod characters;
pub mod events;
pub mod runs;
