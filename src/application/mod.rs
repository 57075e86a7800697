// Application layer - use cases and the request boundary.

pub mod error;
mod notify;
mod request;
mod service;

pub use error::*;
pub use notify::*;
pub use request::*;
pub use service::*;
