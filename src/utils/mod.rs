//! Utility Module
//!
//! - [`interner`]: String interning for parameter, part and drawable ids
//! - [`time`]: Frame timer
//!
//! # String Interning
//!
//! Ids from settings and motion documents are interned once and compared as
//! integers afterwards.
//!
//! ```rust,ignore
//! use myth_puppet::utils::interner;
//!
//! let a = interner::intern("ParamAngleX");
//! let b = interner::intern("ParamAngleX");
//! assert_eq!(a, b); // O(1) comparison
//! ```

pub mod interner;
pub mod time;

pub use interner::Symbol;
pub use time::Timer;
