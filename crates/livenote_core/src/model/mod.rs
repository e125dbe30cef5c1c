//! Domain model shared by the remote contract and the local cache.
//!
//! # Responsibility
//! - Define the note record and its write payloads.
//! - Define the identity shape consumed when stamping authorship.
//!
//! # Invariants
//! - Every note is identified by a stable, server-assigned `NoteId`.
//! - Deletion is a hard delete on the remote side; the cache never keeps
//!   tombstones.

pub mod identity;
pub mod note;
