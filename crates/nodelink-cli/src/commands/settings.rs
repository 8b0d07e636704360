use anyhow::Result;
use nodelink_config::ClientSettings;

pub fn execute(settings: &ClientSettings) -> Result<()> {
    print!("{}", toml::to_string_pretty(settings)?);
    Ok(())
}
