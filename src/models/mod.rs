//! Data models for the Feedly API.
//!
//! - [`primitives`] - Identifier newtypes like `StreamId` and `EntryId`
//! - [`profile`] - The authenticated user's profile
//! - [`entry`] - Stream entries and category/tag listings

pub mod primitives;
pub mod profile;
pub mod entry;

pub use primitives::*;
pub use profile::*;
pub use entry::*;
