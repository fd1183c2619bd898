//! Chunk dispatcher for the sluice chunked upload service.
//!
//! The client half of the chunk protocol: slice a file into the
//! server-chosen chunk size, hash every chunk, upload with bounded
//! concurrency, retry transient failures with exponential backoff, resume
//! from the server's received set, and report the batch outcome to the
//! enclosing framework.

pub mod api;
pub mod dispatcher;

pub use api::{InitiateRequest, InitiateResponse};
pub use dispatcher::{
    BatchOutcome, DispatchError, DispatchResult, Dispatcher, DispatcherOptions, UploadOutcome,
};
