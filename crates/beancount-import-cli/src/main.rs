fn main() -> anyhow::Result<()> {
    beancount_import_cli::run(std::env::args())
}
