//! Engine for a browser-style exam simulator: resolves question banks from
//! layered sources, derives balanced randomized practice sessions, scores
//! heterogeneous question types and reconciles user-edited banks with the
//! bundled master data. Rendering and the actual storage substrate live
//! outside this crate, behind the traits in [`storage`] and [`bank`].

pub mod bank;
pub mod editor;
pub mod progress;
pub mod session;
pub mod storage;
