//! End-to-end scenarios across the codec and store layers
//!
//! Each module drives the public API of the `planb` package the way an
//! application would: build a store from settings, write sessions or
//! reference data, then check what reads, state queries and GC observe.

mod common;

mod gc_safety;
mod hash_collision;
mod key_limits;
mod ref_counting;
mod session_store;
mod tag_sets;
