//! Shared test utilities for the Module Registry workspace.
//!
//! - [`site`]: [`site::TestSite`] builder for module and theme trees

pub mod site;

pub use site::TestSite;
