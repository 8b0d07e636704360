use anyhow::{Context, Result};
use colored::Colorize;
use nodelink_config::{ClientSettings, ConfChoices, ConfigResolver, DaemonConf};
use std::path::PathBuf;

use crate::cli::ConfCommands;

pub fn execute(settings: ClientSettings, cmd: ConfCommands) -> Result<()> {
    let resolver = ConfigResolver::from_settings(&settings);
    match cmd {
        ConfCommands::Show { reveal } => show(&resolver, reveal),
        ConfCommands::Create {
            datadir,
            tor,
            fast_sync,
            force,
        } => create(&resolver, datadir, tor, fast_sync, force),
    }
}

fn show(resolver: &ConfigResolver, reveal: bool) -> Result<()> {
    let Some(conf) = resolver.locate() else {
        println!("{}", "No daemon conf found. Looked in:".yellow());
        for path in resolver.candidates() {
            println!("  {}", path.display());
        }
        return Ok(());
    };

    for (key, value) in describe(&conf, reveal) {
        println!("{:>14}  {}", key.bold(), value);
    }
    Ok(())
}

fn create(
    resolver: &ConfigResolver,
    data_dir: Option<PathBuf>,
    use_tor: bool,
    fast_sync: bool,
    force: bool,
) -> Result<()> {
    if let Some(existing) = resolver.locate() {
        if !force {
            let path = existing.path.unwrap_or_default();
            anyhow::bail!(
                "Daemon conf already exists at: {} (use {} to overwrite)",
                path.display(),
                "--force".yellow()
            );
        }
    }

    let choices = ConfChoices {
        data_dir,
        use_tor,
        fast_sync,
    };
    let written = if force {
        resolver.replace(&choices)
    } else {
        resolver.create(&choices)
    };
    let conf = written.context("Could not write the daemon conf")?;

    println!(
        "{} Created daemon conf at: {}",
        "Success:".green().bold(),
        conf.path.unwrap_or_default().display()
    );
    Ok(())
}

/// Key/value lines describing `conf`, password masked unless `reveal`
pub fn describe(conf: &DaemonConf, reveal: bool) -> Vec<(&'static str, String)> {
    let flag = |on: bool| String::from(if on { "yes" } else { "no" });
    let password = if reveal {
        conf.rpc_password.clone()
    } else {
        "*".repeat(conf.rpc_password.len())
    };

    let mut lines = vec![
        (
            "file",
            conf.path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".into()),
        ),
        ("url", conf.url()),
        ("rpcuser", conf.rpc_user.clone()),
        ("rpcpassword", password),
        ("testnet", flag(conf.testnet)),
        ("daemon", flag(conf.daemonized)),
        ("fastsync", flag(conf.fast_sync)),
        ("txindex", flag(conf.tx_index)),
        ("addressindex", flag(conf.address_index)),
        ("spentindex", flag(conf.spent_index)),
        ("timestampindex", flag(conf.timestamp_index)),
    ];
    if let Some(dir) = &conf.data_dir {
        lines.push(("datadir", dir.display().to_string()));
    }
    if let Some(proxy) = &conf.proxy {
        lines.push(("proxy", proxy.clone()));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodelink_config::DaemonProfile;
    use tempfile::TempDir;

    fn sample() -> DaemonConf {
        DaemonConf::parse(
            "rpcuser=alice\nrpcpassword=secret\nrpcport=9000\nproxy=127.0.0.1:9050\n",
            &DaemonProfile::default(),
            None,
        )
    }

    #[test]
    fn test_describe_masks_password() {
        let lines = describe(&sample(), false);
        assert!(lines.contains(&("rpcpassword", "******".to_string())));
        assert!(lines.contains(&("url", "http://127.0.0.1:9000/".to_string())));
        assert!(lines.contains(&("proxy", "127.0.0.1:9050".to_string())));
    }

    #[test]
    fn test_describe_reveal() {
        let lines = describe(&sample(), true);
        assert!(lines.contains(&("rpcpassword", "secret".to_string())));
    }

    #[test]
    fn test_create_does_not_overwrite_without_force() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("safecoin.conf");
        std::fs::write(&path, "rpcuser=keep\nrpcpassword=me\n").unwrap();
        let resolver = ConfigResolver::new(DaemonProfile::default())
            .with_default_paths(vec![path.clone()]);

        let err = create(&resolver, None, false, false, false).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "rpcuser=keep\nrpcpassword=me\n"
        );

        create(&resolver, None, true, false, true).unwrap();
        let conf = resolver.locate().unwrap();
        assert_eq!(conf.rpc_user, "safecoin");
        assert_eq!(conf.proxy.as_deref(), Some("127.0.0.1:9050"));
    }
}
