fn main() {
    forestdot::cli::run();
}
