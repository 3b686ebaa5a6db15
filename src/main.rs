fn main() {
    labvault_lib::run()
}
