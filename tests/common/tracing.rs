use tracing_subscriber::filter::LevelFilter;

pub fn init_subscriber() {
    // Every test calls this. Only the first call in a test binary installs the subscriber.
    let _ = tracing_subscriber::fmt()
        .with_max_level(LevelFilter::TRACE)
        .with_test_writer()
        .with_target(false)
        .try_init();
}
