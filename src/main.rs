fn main() {
    if let Err(err) = drowsiness_monitor_lib::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
