//! Request middleware.

pub mod access_control;

pub use access_control::loopback_only;
