//! HTTP archive fetcher for toolpin.
//!
//! Downloads a hash-pinned archive, streams it to disk while hashing, and
//! unpacks it only once the digest matches. Supported formats are picked from
//! the URL:
//!
//! - `.tar.gz` / `.tgz`
//! - `.tar.xz`
//! - `.zip`
//! - anything else is kept as a single file named after the last URL segment

use async_trait::async_trait;
use flate2::read::GzDecoder;
use futures::StreamExt;
use reqwest::{Client, Url};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use tar::Archive;
use tokio::io::AsyncWriteExt;
use toolpin_core::tools::ArchiveFetcher;
use toolpin_core::tools::checksum::{Hasher, parse_digest};
use toolpin_core::{Error, Result};
use tracing::{debug, info};

/// Name of the partially downloaded archive inside the destination directory.
const DOWNLOAD_FILE: &str = ".toolpin-download";

/// Archive format inferred from a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// Gzip-compressed tarball.
    TarGz,
    /// XZ-compressed tarball.
    TarXz,
    /// Zip archive.
    Zip,
    /// Not an archive; stored as-is.
    Raw,
}

impl ArchiveFormat {
    /// Infer the format from the path of `url`, ignoring query and fragment.
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
        if path.ends_with(".tar.gz") || path.ends_with(".tgz") {
            Self::TarGz
        } else if path.ends_with(".tar.xz") || path.ends_with(".txz") {
            Self::TarXz
        } else if path.ends_with(".zip") {
            Self::Zip
        } else {
            Self::Raw
        }
    }
}

/// [`ArchiveFetcher`] over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpArchiveFetcher {
    client: Client,
}

impl HttpArchiveFetcher {
    /// Create a fetcher with a default client.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("toolpin/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::configuration(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Create a fetcher using an existing client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Stream `url` into `file`, returning the digest of what was written.
    async fn download(&self, url: &str, hasher: Hasher, file: &Path) -> Result<String> {
        debug!(%url, "Downloading");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::download(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::download(url, format!("HTTP {status}")));
        }

        let mut hasher = hasher;
        let mut out = tokio::fs::File::create(file)
            .await
            .map_err(|e| Error::io(e, file, "create"))?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::download(url, e))?;
            hasher.update(&chunk);
            out.write_all(&chunk)
                .await
                .map_err(|e| Error::io(e, file, "write"))?;
        }
        out.flush().await.map_err(|e| Error::io(e, file, "flush"))?;

        Ok(hasher.finalize())
    }
}

#[async_trait]
impl ArchiveFetcher for HttpArchiveFetcher {
    async fn download_and_extract(&self, url: &str, expected_hash: &str, dest: &Path) -> Result<()> {
        let (algorithm, _) = parse_digest(expected_hash)?;
        let format = ArchiveFormat::from_url(url);
        let target = match format {
            ArchiveFormat::Raw => Some(dest.join(file_name(url)?)),
            _ => None,
        };

        tokio::fs::create_dir_all(dest)
            .await
            .map_err(|e| Error::io(e, dest, "create_dir_all"))?;
        let archive = dest.join(DOWNLOAD_FILE);

        let actual = match self.download(url, Hasher::new(algorithm), &archive).await {
            Ok(actual) => actual,
            Err(e) => {
                let _ = tokio::fs::remove_file(&archive).await;
                return Err(e);
            }
        };
        if actual != expected_hash {
            let _ = tokio::fs::remove_file(&archive).await;
            return Err(Error::digest_mismatch(url, expected_hash, actual));
        }

        let (source, dest_dir) = (archive.clone(), dest.to_path_buf());
        tokio::task::spawn_blocking(move || extract(format, &source, &dest_dir, target.as_deref()))
            .await
            .map_err(|e| Error::extraction(url, e))??;

        if format != ArchiveFormat::Raw {
            tokio::fs::remove_file(&archive)
                .await
                .map_err(|e| Error::io(e, &archive, "remove"))?;
        }

        info!(%url, dest = %dest.display(), "Downloaded and extracted");
        Ok(())
    }
}

/// Last path segment of `url`, used to name raw downloads.
fn file_name(url: &str) -> Result<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(String::from))
        })
        .filter(|name| !name.is_empty())
        .ok_or_else(|| Error::download(url, "URL has no file name"))
}

/// Unpack `archive` into `dest`. A raw download is moved to `target`.
fn extract(format: ArchiveFormat, archive: &Path, dest: &Path, target: Option<&Path>) -> Result<()> {
    let archive_name = archive.display().to_string();
    let open = || File::open(archive).map(BufReader::new).map_err(|e| Error::io(e, archive, "open"));

    match format {
        ArchiveFormat::TarGz => unpack_tar(GzDecoder::new(open()?), dest, &archive_name),
        ArchiveFormat::TarXz => unpack_tar(xz2::read::XzDecoder::new(open()?), dest, &archive_name),
        ArchiveFormat::Zip => unpack_zip(open()?, dest, &archive_name),
        ArchiveFormat::Raw => {
            let target = target.map_or_else(|| dest.join("download"), Path::to_path_buf);
            std::fs::rename(archive, &target).map_err(|e| Error::io(e, &target, "rename"))
        }
    }
}

fn unpack_tar(reader: impl io::Read, dest: &Path, archive_name: &str) -> Result<()> {
    let mut archive = Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive
        .unpack(dest)
        .map_err(|e| Error::extraction(archive_name, format!("Failed to extract tar: {e}")))
}

fn unpack_zip(reader: impl io::Read + io::Seek, dest: &Path, archive_name: &str) -> Result<()> {
    let mut archive = zip::ZipArchive::new(reader)
        .map_err(|e| Error::extraction(archive_name, format!("Failed to open zip: {e}")))?;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| Error::extraction(archive_name, format!("Failed to read zip entry: {e}")))?;

        // Entries escaping the destination are skipped
        let Some(relative) = file.enclosed_name() else {
            continue;
        };
        let outpath: PathBuf = dest.join(relative);

        if file.is_dir() {
            std::fs::create_dir_all(&outpath)
                .map_err(|e| Error::io(e, &outpath, "create_dir_all"))?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(e, parent, "create_dir_all"))?;
        }
        let mut out = File::create(&outpath).map_err(|e| Error::io(e, &outpath, "create"))?;
        io::copy(&mut file, &mut out).map_err(|e| Error::io(e, &outpath, "write"))?;

        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode))
                .map_err(|e| Error::io(e, &outpath, "set_permissions"))?;
        }
    }
    Ok(())
}
