fn main() {
    rsm_pipeline::cli::run();
}
