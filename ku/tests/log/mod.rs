use tracing_subscriber::{
    self,
    EnvFilter,
    filter::LevelFilter,
    fmt,
};

/// Направляет журнал тестового бинарника в перехватываемый вывод тестов.
/// По умолчанию уровень `DEBUG`, его можно изменить через `RUST_LOG`.
pub fn init() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::DEBUG.into())
        .from_env_lossy();

    let format = fmt::format()
        .with_level(true)
        .with_target(false)
        .with_thread_names(true)
        .compact();

    tracing_subscriber::fmt()
        .with_ansi(false)
        .with_test_writer()
        .event_format(format)
        .with_env_filter(filter)
        .init();
}
