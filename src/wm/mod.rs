//! X11 window-manager protocol helpers
//!
//! The bar is an EWMH client: it reads hints from other windows and sends
//! requests to whichever window manager is running.

pub mod ewmh;
pub mod screen;
pub mod window_info;
pub mod window_type;
