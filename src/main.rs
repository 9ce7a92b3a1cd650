fn main() {
    if let Err(err) = gt_recon::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
