// Data models: record rows, cached snapshots, request/response contracts.

pub mod application;
pub mod document;
pub mod requests;
pub mod responses;
