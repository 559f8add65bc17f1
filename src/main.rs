fn main() {
    gantry_pipeline::cli::run();
}
