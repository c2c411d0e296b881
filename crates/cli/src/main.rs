fn main() -> Result<(), Box<dyn std::error::Error>> {
    aries_cli::run()
}
