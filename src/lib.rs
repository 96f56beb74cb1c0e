pub mod clean;
pub mod error;
pub mod frame;
pub mod infra;
pub mod io;
pub mod model;
pub mod pipeline;
pub mod scenario;
pub mod services;
pub mod transform;
pub mod viewmodel;
