//! awesome: a tiling window manager for X11.
//!
//! The library holds the session runtime; `main.rs` only parses arguments,
//! installs logging and hands over to [`wm::run`].

pub mod config;
pub mod error;
pub mod shared;
pub mod wm;
