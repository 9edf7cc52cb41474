//! # Notification Test Suite
//!
//! End-to-end flows that cross crate boundaries: the runtime's wiring, the
//! file-backed stores and the dispatcher's session lifecycle together.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/      # Full send and session flows
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p notify-tests
//! cargo test -p notify-tests integration::
//! ```

pub mod integration;
