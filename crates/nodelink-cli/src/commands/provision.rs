use anyhow::Result;
use colored::Colorize;
use nodelink_client::{HttpTransportFactory, ParameterProvisioner};
use nodelink_config::ClientSettings;

use crate::console::DownloadBar;

pub async fn execute(settings: ClientSettings) -> Result<()> {
    let provisioner = ParameterProvisioner::new(reqwest_client()?, &settings.params);

    if let Some(dir) = provisioner.locate_params() {
        println!("{} {}", "Params already installed in".green(), dir.display());
        return Ok(());
    }

    let mut bar = DownloadBar::new();
    let result = provisioner.provision(|progress| bar.update(progress)).await;
    bar.finish();
    let summary = result?;

    for file in &summary.downloaded {
        println!("{} {}", "downloaded".green(), file);
    }
    for file in &summary.skipped {
        println!("{} {}", "present".dimmed(), file);
    }

    let missing = provisioner.missing();
    if !missing.is_empty() {
        anyhow::bail!("still missing after download: {}", missing.join(", "));
    }
    println!(
        "{} {}",
        "All Downloads Finished Successfully!".green().bold(),
        provisioner.destination().display()
    );
    Ok(())
}

/// Same client setup the connection layer uses for RPC
fn reqwest_client() -> Result<reqwest::Client> {
    let factory = HttpTransportFactory::new().map_err(|e| anyhow::anyhow!(e.message))?;
    Ok(factory.client().clone())
}
