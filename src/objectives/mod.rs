//! Coverage objectives created for replaced calls.
//!
//! Each replaced call yields a true-outcome and a false-outcome objective. [`naming`] derives
//! their identifiers from the call position, and [`ObjectiveStore`] keeps the set of identifiers
//! known to the process.
//!
//! # Examples
//!
//! ```rust
//! use classweave::{
//!     objectives::{naming, ObjectiveStore},
//!     replacement::ReplacementCategory,
//! };
//!
//! let store = ObjectiveStore::new();
//! let template = naming::template("com/foo/Bar", 10, 0);
//! for outcome in [true, false] {
//!     store.register(&naming::with_outcome(&template, outcome, ReplacementCategory::Boolean));
//! }
//! assert_eq!(store.len(), 2);
//! ```

pub mod naming;
mod store;

pub use store::ObjectiveStore;
