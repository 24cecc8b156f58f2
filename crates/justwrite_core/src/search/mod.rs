//! Search over committed posts.
//!
//! # Responsibility
//! - Substring search across post files.
//! - Hashtag extraction and counting.

pub mod text;
