fn main() {
    if let Err(err) = testarena_lib::run() {
        eprintln!("testarena: {err:?}");
        std::process::exit(1);
    }
}
