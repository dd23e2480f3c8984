//! Mod layer discovery for sky-tex-opti.
//!
//! A run starts from an ordered stack of mods. This crate turns the user's
//! mod manager state (a Mod Organizer 2 profile, or a hand-written list of
//! directories) into that stack.
//!
//! Every [`ModSource`] returns mods in **load order**: the first entry has the
//! lowest priority and each later entry overrides everything before it.

mod error;
mod mo2;
mod mod_list;
mod mods;

pub use error::{Error, Result};
pub use mo2::{is_valid_profile_dir, Mo2Profile};
pub use mod_list::ModListFile;
pub use mods::{Mod, ModSource};
