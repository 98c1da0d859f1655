//! keytone - terminal keyboard for the synthesis engine
//!
//! Run with: cargo run

mod app;
mod keys;
mod ui;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    env_logger::init();

    app::run()
}
