fn main() {
    if let Err(err) = smartkey::cli::run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}
