//! External service integrations.

pub mod circuit_breaker {
    pub use crate::circuit_breaker::*;
}

pub mod insights {
    pub use crate::insights::*;
}
