//! Client library of OpenPAI: job submission with source staging on WebHDFS.

pub mod client;
pub(crate) mod http;
pub mod notebook;
pub mod storage;

pub use client::{JobClient, Token};
