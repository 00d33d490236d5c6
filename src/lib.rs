//! Purpose: Track-multiplexing allocator for async trace slices, plus its replay driver.
//! Exports: `api` (stable surface), `core` (tracker internals), `notice`, `replay`.
//! Role: Library backing the `trackmux` binary and in-process trace importers.
//! Invariants: The allocator performs no I/O; only `replay` touches readers/writers.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
pub mod core;
pub mod notice;
pub mod replay;
