//! Integration tests for the boot2k8s CLI
//!
//! These tests spawn the actual binary and check argument handling and the
//! commands that need neither Docker nor SSH.
