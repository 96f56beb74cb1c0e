//! Concrete clients for the external collaborators.

pub mod bcb;
pub mod genai;
pub mod sheets;
