//! Whole-session tests: a mask on disk, overlays, decisions and ledger files.

mod session_tests;
