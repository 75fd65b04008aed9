//! Service layer: thin, owner-scoped operations over storage and the
//! engine, shared by every transport.

pub mod agent;
pub mod pipeline;
pub mod run;
pub mod tool;
