//! Sequential download of the proving parameter files
//!
//! Files are fetched one at a time in queue order. Each transfer goes to
//! `<name>.part` and is renamed only after the body arrived completely, so a
//! file under its final name is always whole. Files already present are
//! skipped without touching the network, which makes a retry resume where a
//! failed run stopped.

use crate::error::ProvisionError;
use futures::StreamExt;
use nodelink_config::ParamsSettings;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Snapshot of the transfer in progress
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadProgress {
    pub file: String,
    /// Queue entries after this one
    pub remaining: usize,
    pub done: u64,
    pub total: Option<u64>,
    pub elapsed: Duration,
}

impl DownloadProgress {
    /// Bytes per second over the whole transfer so far
    pub fn speed(&self) -> f64 {
        let millis = self.elapsed.as_millis().max(1) as f64;
        self.done as f64 * 1000.0 / millis
    }

    /// `Downloading NAME ( +N more remaining )`
    pub fn title(&self) -> String {
        if self.remaining > 0 {
            format!(
                "Downloading {} ( +{} more remaining )",
                self.file, self.remaining
            )
        } else {
            format!("Downloading {}", self.file)
        }
    }

    /// `X MB of Y MB at S unit`
    pub fn detail(&self) -> String {
        const MB: u64 = 1024 * 1024;
        let total = self.total.map(|t| (t / MB).to_string()).unwrap_or_else(|| "?".into());
        format!(
            "{}MB of {}MB at {}",
            self.done / MB,
            total,
            format_speed(self.speed())
        )
    }
}

/// Two decimals with `bytes/sec`, `kB/s` or `MB/s`
pub fn format_speed(bytes_per_sec: f64) -> String {
    if bytes_per_sec < 1024.0 {
        format!("{bytes_per_sec:.2} bytes/sec")
    } else if bytes_per_sec < 1024.0 * 1024.0 {
        format!("{:.2} kB/s", bytes_per_sec / 1024.0)
    } else {
        format!("{:.2} MB/s", bytes_per_sec / (1024.0 * 1024.0))
    }
}

/// What one provisioning run did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProvisionSummary {
    pub downloaded: Vec<String>,
    pub skipped: Vec<String>,
}

/// Target file name: the URL's last path segment
pub fn file_name_for(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let name = path.rsplit('/').next()?;
    (!name.is_empty()).then(|| name.to_string())
}

pub struct ParameterProvisioner {
    client: reqwest::Client,
    urls: Vec<String>,
    destination: PathBuf,
    required: Vec<String>,
    search_dirs: Vec<PathBuf>,
}

impl ParameterProvisioner {
    pub fn new(client: reqwest::Client, settings: &ParamsSettings) -> Self {
        Self {
            client,
            urls: settings.urls.clone(),
            destination: settings.params_dir(),
            required: settings.required.clone(),
            search_dirs: settings.search_order(),
        }
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// First search directory holding every required file
    pub fn locate_params(&self) -> Option<PathBuf> {
        let found = self
            .search_dirs
            .iter()
            .find(|dir| self.required.iter().all(|name| dir.join(name).is_file()))
            .cloned();
        match &found {
            Some(dir) => debug!(dir = %dir.display(), "Found params"),
            None => debug!("Params not found in any search directory"),
        }
        found
    }

    /// Required files absent from the download destination
    pub fn missing(&self) -> Vec<String> {
        self.required
            .iter()
            .filter(|name| !self.destination.join(name).is_file())
            .cloned()
            .collect()
    }

    /// Work through the queue; resolves once, after the last file
    ///
    /// The first failed transfer aborts the rest of the queue. Files that
    /// finished before it stay in place.
    pub async fn provision<P>(&self, mut on_progress: P) -> Result<ProvisionSummary, ProvisionError>
    where
        P: FnMut(&DownloadProgress),
    {
        tokio::fs::create_dir_all(&self.destination)
            .await
            .map_err(|source| ProvisionError::CreateDir {
                path: self.destination.clone(),
                source,
            })?;

        let mut summary = ProvisionSummary::default();
        info!(count = self.urls.len(), dir = %self.destination.display(), "Provisioning params");

        for (index, url) in self.urls.iter().enumerate() {
            let Some(file) = file_name_for(url) else {
                warn!(url, "Skipping URL without a file name");
                continue;
            };
            let target = self.destination.join(&file);
            if target.exists() {
                debug!(file, "Already present, skipping");
                summary.skipped.push(file);
                continue;
            }

            let remaining = self.urls.len() - index - 1;
            self.download(url, &file, &target, remaining, &mut on_progress)
                .await?;
            summary.downloaded.push(file);
        }

        info!(
            downloaded = summary.downloaded.len(),
            skipped = summary.skipped.len(),
            "All downloads finished"
        );
        Ok(summary)
    }

    async fn download<P>(
        &self,
        url: &str,
        file: &str,
        target: &Path,
        remaining: usize,
        on_progress: &mut P,
    ) -> Result<(), ProvisionError>
    where
        P: FnMut(&DownloadProgress),
    {
        let part = self.destination.join(format!("{file}.part"));
        info!(url, file, "Downloading");

        let result = self
            .transfer(url, file, &part, remaining, on_progress)
            .await;

        match result {
            Ok(()) => tokio::fs::rename(&part, target)
                .await
                .map_err(|source| ProvisionError::Write {
                    path: target.to_path_buf(),
                    source,
                }),
            Err(e) => {
                warn!(file, error = %e, "Download failed");
                if let Err(rm) = tokio::fs::remove_file(&part).await {
                    debug!(path = %part.display(), error = %rm, "No partial file to remove");
                }
                Err(e)
            }
        }
    }

    async fn transfer<P>(
        &self,
        url: &str,
        file: &str,
        part: &Path,
        remaining: usize,
        on_progress: &mut P,
    ) -> Result<(), ProvisionError>
    where
        P: FnMut(&DownloadProgress),
    {
        let download_err = |message: String| ProvisionError::Download {
            file: file.to_string(),
            message,
        };
        let write_err = |source| ProvisionError::Write {
            path: part.to_path_buf(),
            source,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| download_err(e.to_string()))?;

        let total = response.content_length();
        let mut out = tokio::fs::File::create(part).await.map_err(write_err)?;
        let started = Instant::now();
        let mut done: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| download_err(e.to_string()))?;
            out.write_all(&bytes).await.map_err(write_err)?;
            done += bytes.len() as u64;
            on_progress(&DownloadProgress {
                file: file.to_string(),
                remaining,
                done,
                total,
                elapsed: started.elapsed(),
            });
        }

        out.flush().await.map_err(write_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(512.0, "512.00 bytes/sec")]
    #[test_case(2048.0, "2.00 kB/s")]
    #[test_case(3.5 * 1024.0 * 1024.0, "3.50 MB/s")]
    fn test_format_speed(speed: f64, expected: &str) {
        assert_eq!(format_speed(speed), expected);
    }

    #[test]
    fn test_progress_text() {
        let progress = DownloadProgress {
            file: "sapling-spend.params".into(),
            remaining: 3,
            done: 10 * 1024 * 1024,
            total: Some(45 * 1024 * 1024),
            elapsed: Duration::from_secs(5),
        };
        assert_eq!(
            progress.title(),
            "Downloading sapling-spend.params ( +3 more remaining )"
        );
        assert_eq!(progress.detail(), "10MB of 45MB at 2.00 MB/s");

        let last = DownloadProgress {
            remaining: 0,
            total: None,
            ..progress
        };
        assert_eq!(last.title(), "Downloading sapling-spend.params");
        assert!(last.detail().starts_with("10MB of ?MB"));
    }

    #[test_case("https://z.cash/downloads/sapling-output.params", Some("sapling-output.params"))]
    #[test_case("https://host/dir/file.key?sig=abc", Some("file.key"))]
    #[test_case("https://host/dir/", None)]
    fn test_file_name_for(url: &str, expected: Option<&str>) {
        assert_eq!(file_name_for(url).as_deref(), expected);
    }

    #[test]
    fn test_locate_params_uses_first_complete_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        let partial = tmp.path().join("partial");
        let complete = tmp.path().join("complete");
        std::fs::create_dir_all(&partial).unwrap();
        std::fs::create_dir_all(&complete).unwrap();
        std::fs::write(partial.join("sapling-output.params"), "x").unwrap();
        std::fs::write(complete.join("sapling-output.params"), "x").unwrap();
        std::fs::write(complete.join("sapling-spend.params"), "x").unwrap();

        let settings = ParamsSettings {
            dir: Some(tmp.path().join("dest")),
            search_dirs: vec![partial, complete.clone()],
            ..ParamsSettings::default()
        };
        let provisioner = ParameterProvisioner::new(reqwest::Client::new(), &settings);

        assert_eq!(provisioner.locate_params(), Some(complete));
        assert_eq!(provisioner.missing().len(), 2);
    }
}
