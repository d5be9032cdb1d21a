mod authentication;
mod health_check;
mod orders;
mod products;

pub use authentication::*;
pub use health_check::*;
pub use orders::*;
pub use products::*;
