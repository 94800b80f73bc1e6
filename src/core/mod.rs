// Domain-layer modules: the pure engine plus shared errors/models
pub mod metrics {
    pub use crate::metrics::*;
}

pub mod segments {
    pub use crate::segments::*;
}

pub mod trend {
    pub use crate::trend::*;
}

pub mod dashboard {
    pub use crate::dashboard::*;
}

pub mod normalize {
    pub use crate::normalize::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
