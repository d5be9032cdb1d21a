mod register;
mod token;

pub use register::*;
pub use token::*;
