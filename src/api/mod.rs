pub mod error;
pub mod handlers;
pub mod headers;
pub mod routes;

pub use error::*;
pub use handlers::*;
pub use headers::*;
pub use routes::*;
