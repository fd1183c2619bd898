//! HTTP request handlers.

pub mod common;
pub mod ingest;
pub mod uploads;

pub use common::*;
pub use ingest::*;
pub use uploads::*;
