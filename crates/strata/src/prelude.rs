pub use crate::error::{Error, StResult};

pub use tracing::{debug, debug_span, error, info, info_span, trace, warn};

// vim: ts=4
