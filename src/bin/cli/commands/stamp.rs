use anyhow::Result;

use trish_lib::stamp::VersionStamp;

use crate::OutputFormat;

pub fn run(format: &OutputFormat) -> Result<()> {
    let stamp = VersionStamp::now();

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "stamp": stamp,
                "instant": stamp.instant(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => println!("{}", stamp),
    }

    Ok(())
}
