//! Steam Workshop mod management for DayZ dedicated servers.
//!
//! Raw settings entries become [`Mod`] values, which resolve to install
//! directories viewed through [`InstalledMod`]. [`reconcile::fix_paths`]
//! repairs mixed-case downloads and [`modlist`] renders mod lists for
//! display and for the server command line.

pub mod cli;
pub mod config;
pub mod dayz;
pub mod error;
pub mod fetch;
pub mod installed;
pub mod keys;
pub mod modlist;
pub mod mods;
pub mod reconcile;
pub mod state;

pub use error::{ModError, ModResult};
pub use installed::{InstalledMod, ModFiles};
pub use mods::{resolve, Mod, ModRecord, ModRef};
