//! Core Session Logic
//!
//! Document snapshots, module resolution and the sessions that tie them to
//! a live engine.

pub mod document;
pub mod resolver;
pub mod session;

pub use document::{Document, DocumentFactory, DocumentSnapshot, DocumentSnapshotStore, ScriptKind};
pub use resolver::{ModuleResolver, ResolvedModule};
pub use session::{AnalysisSession, EngineState, SessionHost};
