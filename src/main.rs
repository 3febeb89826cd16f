fn main() {
    if let Err(err) = nexus::cli::main() {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }
}
