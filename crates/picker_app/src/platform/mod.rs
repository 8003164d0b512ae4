mod app;
mod logging;
mod settings;
mod status;

pub use app::run_app;
