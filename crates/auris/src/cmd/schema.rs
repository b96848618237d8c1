use anyhow::Result;
use auris_spec::screen_view_schema;
use clap::Args;

#[derive(Args, Debug, Clone, Default)]
pub struct SchemaArgs {}

pub fn run(_args: &SchemaArgs) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&screen_view_schema())?);
    Ok(())
}
