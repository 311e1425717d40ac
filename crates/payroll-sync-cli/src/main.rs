use anyhow::Result;

fn main() -> Result<()> {
    payroll_sync_cli::run(std::env::args())
}
