// src/wgpu_utils/mod.rs
//! WGPU utility functions and helpers
//!
//! Binding-number conventions shared by the wgpu backend and the bind group
//! layouts shaders are built against.

pub mod binding_types;

pub use binding_types::*;
