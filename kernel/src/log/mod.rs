pub use ku::log::{
    debug,
    error,
    info,
    trace,
    warn,
};
