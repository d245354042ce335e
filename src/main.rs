fn main() {
    fieldops_lib::run()
}
