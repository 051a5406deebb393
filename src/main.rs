fn main() {
    if let Err(err) = workforce_ingest::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
