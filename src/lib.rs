//! orchard: a hierarchy of membership nodes with resource ledgers,
//! admission checks and monthly harvest batches.
//!
//! Layers, inner to outer: `domain` (pure rules), `application` (store and
//! services), `infrastructure` (I/O and wiring), `cli`.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
