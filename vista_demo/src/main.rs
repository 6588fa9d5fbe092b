//! Vista demo
//!
//! Opens a window, loads the model named in `vista.toml` (or a cube when
//! none is configured) and spins it until the window is closed.
//!
//! Usage: `vista_demo [config.toml]`

mod app;
mod cube;

use std::path::PathBuf;
use std::process::ExitCode;
use vista_engine::vista::config::{Config, EngineConfig};
use vista_engine::vista::{Engine, Error};
use vista_engine::{engine_error, engine_info};
use winit::event_loop::{ControlFlow, EventLoop};

const DEFAULT_CONFIG: &str = "vista.toml";

fn load_config(path: &PathBuf) -> vista_engine::vista::Result<EngineConfig> {
    if !path.exists() {
        engine_info!("vista::demo", "{} not found, using defaults", path.display());
        return Ok(EngineConfig::default());
    }
    let config = EngineConfig::load_from_file(path)?;
    config.validate()?;
    Ok(config)
}

/// Run the demo until the window closes; the app is dropped before returning
fn run(config: EngineConfig) -> vista_engine::vista::Result<()> {
    let event_loop = EventLoop::new()
        .map_err(|e| Error::InitializationFailed(format!("Failed to create event loop: {}", e)))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = app::DemoApp::new(config);
    let loop_result = event_loop.run_app(&mut app);
    let app_result = app.finish();
    loop_result.map_err(|e| Error::BackendError(format!("Event loop error: {}", e)))?;
    app_result
}

fn main() -> ExitCode {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));

    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            engine_error!("vista::demo", "Failed to load {}: {}", config_path.display(), e);
            return ExitCode::FAILURE;
        }
    };
    Engine::set_log_level(config.log_level);

    let status = match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            engine_error!("vista::demo", "Demo stopped: {}", e);
            ExitCode::FAILURE
        }
    };

    vista_engine_renderer_vulkan::print_validation_stats_report();
    status
}
