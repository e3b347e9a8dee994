//! Backend implementations.

pub mod loopback;
