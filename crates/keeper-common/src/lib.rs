//! Keeper-Common: Shared types and errors.
//!
//! This crate provides common functionality used across stream-keeper:
//!
//! - **Typed IDs**: [`StreamKey`] for broadcast destinations and [`RunId`]
//!   for one supervised cohort
//! - **Error Handling**: the configuration-level [`Error`] and result alias
//!
//! # Examples
//!
//! ```
//! use keeper_common::{Error, Result, StreamKey};
//!
//! let key = StreamKey::new("abcd-efgh-ijkl").unwrap();
//! assert_eq!(key.as_str(), "abcd-efgh-ijkl");
//!
//! fn example() -> Result<StreamKey> {
//!     Err(Error::config("no stream keys supplied"))
//! }
//! assert!(example().is_err());
//! ```

pub mod error;
pub mod ids;

pub use error::{Error, Result};
pub use ids::*;
