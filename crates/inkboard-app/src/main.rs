//! Native entry point: replay a drawing script and print the board as SVG.

#[cfg(feature = "native")]
fn main() {
    env_logger::init();
    log::info!("Starting Inkboard replay");

    if let Err(e) = inkboard_app::replay::run_cli(std::env::args().skip(1)) {
        log::error!("{}", e);
        eprintln!("inkboard: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "native"))]
fn main() {
    eprintln!("Native feature not enabled. Use `cargo run --features native`");
}
