fn main() -> anyhow::Result<()> {
    auris::cli::main()
}
