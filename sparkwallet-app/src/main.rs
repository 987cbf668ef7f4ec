fn main() {
    sparkwallet_app_lib::run()
}
