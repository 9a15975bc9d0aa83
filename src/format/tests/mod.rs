//! Unit tests for the ledger CSV codec.
//!
//! These tests cover the on-disk layout, quoting, and round trips through
//! the primary and double-check ledgers.
