//! Unit tests for the boot2k8s CLI
//!
//! These tests use in-memory transports and a scripted Docker daemon and
//! run without Docker or SSH.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod architecture;
mod commands;
mod helpers;
mod tunnel_proxy;
