fn main() {
    if let Err(err) = saasboard::cli::run() {
        saasboard::ui::eprintln_error(&err);
        std::process::exit(saasboard::exit::exit_code(&err));
    }
}
