use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Where the graph bytes come from.
#[derive(Clone, Debug)]
pub enum GraphSource {
    File(PathBuf),
    Stdin,
    /// Streaming endpoint of a crawl server for one job.
    Server { base_url: String, job_id: String },
}

impl GraphSource {
    pub fn data_url(base_url: &str, job_id: &str) -> String {
        format!("{}/api/v1/graph/{job_id}/data", base_url.trim_end_matches('/'))
    }

    /// Opens the source for reading. HTTP responses are streamed as they
    /// arrive; nothing is buffered here.
    pub fn open(&self) -> Result<Box<dyn Read + Send>> {
        match self {
            Self::File(path) => {
                let file = File::open(path)
                    .with_context(|| format!("failed to open graph file {}", path.display()))?;
                Ok(Box::new(file))
            }
            Self::Stdin => Ok(Box::new(io::stdin())),
            Self::Server { base_url, job_id } => {
                let url = Self::data_url(base_url, job_id);
                tracing::info!(%url, "requesting graph stream");

                let client = reqwest::blocking::Client::builder()
                    .timeout(None)
                    .build()
                    .context("failed to build http client")?;
                let response = client
                    .get(&url)
                    .send()
                    .with_context(|| format!("failed to reach {url}"))?
                    .error_for_status()
                    .with_context(|| format!("graph request to {url} was rejected"))?;
                Ok(Box::new(response))
            }
        }
    }
}

impl fmt::Display for GraphSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Stdin => f.write_str("stdin"),
            Self::Server { base_url, job_id } => write!(f, "{}", Self::data_url(base_url, job_id)),
        }
    }
}
