fn main() {
    if let Err(err) = isswatch_lib::run() {
        eprintln!("isswatch: {err:#}");
        std::process::exit(1);
    }
}
