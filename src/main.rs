fn main() -> anyhow::Result<()> {
    krawl_lib::run()
}
