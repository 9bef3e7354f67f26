fn main() {
    if let Err(err) = causette::cli::main() {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }
}
