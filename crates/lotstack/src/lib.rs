//! LotStack Core Library
//!
//! Photo-batch staging and catalog ingestion engine.
//! This library contains the staging session model, time-based clustering,
//! the stack editor, and the sequential ingestion pipeline that turns
//! staged stacks into catalog records with uploaded assets.

pub mod core;
