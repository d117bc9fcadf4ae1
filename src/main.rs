fn main() {
    otdr_trace::cli::run();
}
