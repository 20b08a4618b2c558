//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod fake_aria2;
pub mod socket_guard;
