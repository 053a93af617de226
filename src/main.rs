fn main() {
    #[cfg(feature = "cli")]
    vcdecode::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("vcdecode: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
