/// Install the `env_logger` backend. `RUST_LOG` wins when set; otherwise
/// the level is `info`, or `debug` with `verbose`.
pub fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_default_env();
    if std::env::var("RUST_LOG").is_err() {
        builder.filter_level(if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        });
    }
    let _ = builder.try_init();
}
