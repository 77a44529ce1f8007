//! Core engine components, leaf-first: audio pipeline, agent transport,
//! persona machine, transcript assembly, and tool dispatch.

pub mod agent;
pub mod audio;
pub mod persona;
pub mod tools;
pub mod transcript;
