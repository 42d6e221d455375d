//! Motor de patches JSON (RFC 6902 sobre punteros RFC 6901) aplicado al
//! documento de esquema.
//!
//! `apply_patch` nunca muta su entrada: trabaja sobre la representación JSON
//! del documento y sólo devuelve un `Schema` nuevo si el resultado pasa la
//! validación estructural.

mod apply;
mod diff;
mod operation;
mod pointer;

pub use apply::{apply_patch, apply_to_value};
pub use diff::diff;
pub use operation::PatchOperation;
pub use pointer::{escape_segment, parse_pointer};
