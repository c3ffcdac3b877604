// Remote backend clients: the Postgres record store, the object-storage
// API, and the callable functions.

pub mod functions;
pub mod records;
pub mod storage;
