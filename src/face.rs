//! Face landmark estimation.

pub mod facemesh;

pub use facemesh::FaceMesh;
