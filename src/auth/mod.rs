pub mod jwt;

pub use jwt::{subject, verify_jwt, Claims};
