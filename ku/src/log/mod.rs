pub use tracing::{
    debug,
    error,
    info,
    trace,
    warn,
};
