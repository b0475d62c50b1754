//! Subcommand implementations. Each prints one JSON document on stdout.

pub(crate) mod actions;
pub(crate) mod audit;
pub(crate) mod keys;
pub(crate) mod plan;

use serde::Serialize;

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
