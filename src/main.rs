fn main() {
    std::process::exit(scp_push_lib::run());
}
