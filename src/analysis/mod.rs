//! Mask quality analysis.

mod connectivity;

pub use connectivity::{Component, ConnectivityReport, RegionConnectivityAnalyzer, RegionDefect};
