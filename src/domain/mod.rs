pub mod order_status;
pub mod user_email;
pub mod username;
