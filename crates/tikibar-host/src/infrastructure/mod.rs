//! Infrastructure layer for tikibar-host.
//!
//! Concrete implementations of the [`HostPage`](crate::application::HostPage)
//! port.
//!
//! # Responsibilities
//!
//! - Reading and writing the document (elements, attributes, inline styles)
//! - Posting to the frame's window and receiving message events
//! - Hooking jQuery's AJAX completion event and replacing `window.fetch`
//! - The exported wasm entry point (`installTikibar`)
//!
//! # What does NOT belong here?
//!
//! - Deciding what to send or whether an origin is trusted (application)
//! - Message shapes and layout values (`tikibar-core`)

pub mod memory_page;

#[cfg(target_arch = "wasm32")]
pub mod browser;

pub use memory_page::MemoryPage;
