mod platform;

fn main() {
    if let Err(err) = platform::run_app() {
        eprintln!("media-picker error: {err:#}");
        std::process::exit(1);
    }
}
