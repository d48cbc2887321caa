use env_logger::Env;

pub fn init() {
    // RUST_LOG wins; otherwise info for us, warn for dependencies
    let env = Env::default().default_filter_or("warn,bodyctl=info");
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();
}
