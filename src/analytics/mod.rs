//! Request analytics: the JSONL event log written by the server and the
//! aggregations behind `wastemeter stats`.

pub mod events;
pub mod logger;
pub mod reporter;
