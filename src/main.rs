//! Forward multi-pass lighting demo
//!
//! Controls: hold the right mouse button to look around and move with WASD,
//! press X to toggle the flashlight and Escape to quit.

use tallow::config::RenderConfig;
use tallow::logging::{init_logging, LoggingConfig};
use tallow::TallowApp;

fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default());

    let app = TallowApp::new(RenderConfig::from_env())?;
    app.run()
}
