//! ICS feed parsing.
//!
//! This module reads calendar feeds according to RFC 5545. Only the fields a
//! reminder needs are extracted.

mod parse;

pub use parse::parse_feed;
