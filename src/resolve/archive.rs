//! Resolves a license by downloading the module's source archive from a
//! Go module proxy and scanning it with a [`LicenseDetector`].
//!
//! The archive host may or may not support byte-range requests. When it
//! does, [`HttpRangeReader`] lets the zip reader seek and read on demand
//! without ever pulling the whole archive over the wire. When it
//! doesn't, the body is buffered through [`TieredByteStore`]: the first
//! [`MEMORY_TIER_LIMIT`] bytes in memory, anything beyond that spilled
//! to a temp file up to [`FILE_TIER_LIMIT`], released when the resolver
//! call returns.

use std::collections::HashMap;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

use reqwest::StatusCode;
use tokio_stream::StreamExt as _;

use crate::error::ValidationError;
use crate::module::{License, Module};

use super::detector::{FilerFuture, LicenseDetector, LicenseFiler};
use super::{LicenseResolver, ResolveFuture};

/// Upper bound on the in-memory tier of [`TieredByteStore`].
const MEMORY_TIER_LIMIT: usize = 8 * 1024 * 1024;

/// Upper bound on the combined memory+file-backed store. An archive
/// larger than this is refused rather than spooled to disk without
/// limit.
const FILE_TIER_LIMIT: u64 = 512 * 1024 * 1024;

/// Encodes a module path the way the Go module proxy protocol requires:
/// every uppercase letter is replaced with `!` followed by its lowercase
/// form, since module proxy URLs must be case-insensitive-filesystem-safe.
pub fn encode_module_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if c.is_ascii_uppercase() {
            out.push('!');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Read-only view over a downloaded zip archive's entries, with the
/// `<module>@<version>/` prefix every Go proxy zip wraps its content in
/// stripped off, so `read_dir("")` sees the module's own root.
pub struct ZipFiler {
    files: HashMap<String, Vec<u8>>,
    dirs: HashMap<String, Vec<String>>,
}

impl ZipFiler {
    /// Builds a filer from any seekable byte source: a fully-buffered
    /// [`TieredByteStore`] when the upstream host lacks range support,
    /// or a plain `Cursor<Vec<u8>>` in tests.
    fn from_reader<R: Read + Seek>(reader: R, prefix: &str) -> Result<Self, ValidationError> {
        let mut archive =
            zip::ZipArchive::new(reader).map_err(|e| ValidationError::upstream(format!("invalid zip archive: {e}")))?;

        let mut files = HashMap::new();
        let mut dirs: HashMap<String, Vec<String>> = HashMap::new();

        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| ValidationError::upstream(format!("corrupt zip entry: {e}")))?;
            if entry.is_dir() {
                continue;
            }
            let Some(name) = entry.name().strip_prefix(prefix) else {
                continue;
            };
            let name = name.trim_start_matches('/');
            if name.is_empty() {
                continue;
            }

            let mut content = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut content)
                .map_err(|e| ValidationError::upstream(format!("failed reading zip entry: {e}")))?;

            let parent = match name.rfind('/') {
                Some(idx) => &name[..idx],
                None => "",
            };
            dirs.entry(parent.to_string())
                .or_default()
                .push(name.to_string());
            files.insert(name.to_string(), content);
        }

        Ok(Self { files, dirs })
    }
}

impl LicenseFiler for ZipFiler {
    fn read_file<'a>(&'a self, path: &'a str) -> FilerFuture<'a, Vec<u8>> {
        let result = self
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| ValidationError::UnknownLicense);
        Box::pin(async move { result })
    }

    fn read_dir<'a>(&'a self, path: &'a str) -> FilerFuture<'a, Vec<String>> {
        let result = Ok(self.dirs.get(path).cloned().unwrap_or_default());
        Box::pin(async move { result })
    }
}

/// Buffers a downloaded body across two tiers: the first
/// `mem_limit` bytes in memory, anything beyond that spilled to an
/// anonymous temp file (unlinked on creation, reclaimed when the last
/// handle — this one — is dropped) up to `file_limit`. Gives the zip
/// reader a `Read + Seek` view without requiring the whole archive to
/// fit in memory.
struct TieredByteStore {
    mem: Vec<u8>,
    file: Option<std::fs::File>,
    pos: u64,
    len: u64,
}

impl TieredByteStore {
    /// Drains `stream` into the tiered store, spilling to disk once
    /// `mem_limit` bytes have been buffered in memory. Fails once the
    /// total exceeds `file_limit` rather than spooling without bound.
    async fn collect(
        mut stream: impl tokio_stream::Stream<Item = reqwest::Result<bytes::Bytes>> + Unpin,
        mem_limit: usize,
        file_limit: u64,
    ) -> Result<Self, ValidationError> {
        let mut mem = Vec::new();
        let mut file: Option<std::fs::File> = None;
        let mut total: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ValidationError::upstream(format!("archive download failed: {e}")))?;
            total += chunk.len() as u64;
            if total > file_limit {
                return Err(ValidationError::upstream(format!(
                    "module archive exceeds the {file_limit}-byte size limit"
                )));
            }

            let mut remaining = &chunk[..];
            if mem.len() < mem_limit {
                let room = mem_limit - mem.len();
                let take = room.min(remaining.len());
                mem.extend_from_slice(&remaining[..take]);
                remaining = &remaining[take..];
            }
            if !remaining.is_empty() {
                let spill = match &mut file {
                    Some(f) => f,
                    None => {
                        let f = tempfile::tempfile()
                            .map_err(|e| ValidationError::upstream(format!("failed to create spill file: {e}")))?;
                        file = Some(f);
                        file.as_mut().expect("just inserted")
                    }
                };
                spill
                    .write_all(remaining)
                    .map_err(|e| ValidationError::upstream(format!("failed spilling archive to disk: {e}")))?;
            }
        }

        if let Some(f) = file.as_mut() {
            f.seek(SeekFrom::Start(0))
                .map_err(|e| ValidationError::upstream(format!("failed rewinding spill file: {e}")))?;
        }

        Ok(Self { mem, file, pos: 0, len: total })
    }
}

impl Read for TieredByteStore {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.len || buf.is_empty() {
            return Ok(0);
        }
        let mem_len = self.mem.len() as u64;
        if self.pos < mem_len {
            let start = self.pos as usize;
            let n = buf.len().min(self.mem.len() - start);
            buf[..n].copy_from_slice(&self.mem[start..start + n]);
            self.pos += n as u64;
            Ok(n)
        } else {
            let file = self
                .file
                .as_mut()
                .expect("position past the memory tier implies a spill file was created");
            file.seek(SeekFrom::Start(self.pos - mem_len))?;
            let n = file.read(buf)?;
            self.pos += n as u64;
            Ok(n)
        }
    }
}

impl Seek for TieredByteStore {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(p) => p as i64,
            SeekFrom::End(p) => self.len as i64 + p,
            SeekFrom::Current(p) => self.pos as i64 + p,
        };
        if new_pos < 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "seek to a negative position"));
        }
        self.pos = new_pos as u64;
        Ok(self.pos)
    }
}

/// A `Read + Seek` view over a remote resource that issues a fresh
/// `Range` request for each read, rather than buffering the whole body.
/// Used only when the proxy response advertised `Accept-Ranges: bytes`.
///
/// Built on [`reqwest::blocking::Client`] because the `zip` crate's
/// reader contract is synchronous; every call site constructs one of
/// these and drives it from inside `tokio::task::spawn_blocking` so the
/// blocking range reads never hold up the async reactor.
struct HttpRangeReader {
    client: reqwest::blocking::Client,
    url: reqwest::Url,
    len: u64,
    pos: u64,
}

impl HttpRangeReader {
    fn new(client: reqwest::blocking::Client, url: reqwest::Url, len: u64) -> Self {
        Self { client, url, len, pos: 0 }
    }
}

impl Read for HttpRangeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.len || buf.is_empty() {
            return Ok(0);
        }
        let end = (self.pos + buf.len() as u64 - 1).min(self.len - 1);
        let response = self
            .client
            .get(self.url.clone())
            .header(reqwest::header::RANGE, format!("bytes={}-{end}", self.pos))
            .send()
            .map_err(|e| io::Error::other(format!("range request failed: {e}")))?;
        let bytes = response
            .bytes()
            .map_err(|e| io::Error::other(format!("range response read failed: {e}")))?;
        let n = bytes.len().min(buf.len());
        buf[..n].copy_from_slice(&bytes[..n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for HttpRangeReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(p) => p as i64,
            SeekFrom::End(p) => self.len as i64 + p,
            SeekFrom::Current(p) => self.pos as i64 + p,
        };
        if new_pos < 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "seek to a negative position"));
        }
        self.pos = new_pos as u64;
        Ok(self.pos)
    }
}

fn advertises_range_support(headers: &reqwest::header::HeaderMap) -> bool {
    headers
        .get(reqwest::header::ACCEPT_RANGES)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("bytes"))
}

/// Downloads `<base>/<module>/@v/<version>.zip` from a Go module proxy
/// and runs a [`LicenseDetector`] over its contents.
pub struct ArchiveResolver<D> {
    client: reqwest::Client,
    blocking_client: reqwest::blocking::Client,
    base_url: url::Url,
    detector: D,
}

impl<D: LicenseDetector> ArchiveResolver<D> {
    pub fn new(client: reqwest::Client, base_url: url::Url, detector: D) -> Self {
        Self {
            client,
            blocking_client: reqwest::blocking::Client::new(),
            base_url,
            detector,
        }
    }

    async fn resolve(&self, module: &Module) -> Result<License, ValidationError> {
        let encoded_name = encode_module_path(&module.name);
        let encoded_version = encode_module_path(module.version.original());
        let url = self
            .base_url
            .join(&format!("{encoded_name}/@v/{encoded_version}.zip"))
            .map_err(|e| ValidationError::upstream(format!("invalid module proxy URL: {e}")))?;

        tracing::debug!(module = %module, %url, "fetching module archive");

        let response = self.client.get(url.clone()).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => return Err(ValidationError::UnknownLicense),
            status if !status.is_success() => {
                return Err(ValidationError::upstream(format!(
                    "module proxy returned {status}"
                )));
            }
            _ => {}
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.starts_with("application/zip") {
            return Err(ValidationError::InvalidContentType(content_type));
        }

        let prefix = format!("{}@{}/", module.name, module.version.original());
        let range_capable = advertises_range_support(response.headers()) && response.content_length().is_some();

        let filer = if range_capable {
            let len = response.content_length().expect("checked above");
            drop(response);
            let blocking_client = self.blocking_client.clone();
            tracing::debug!(module = %module, len, "archive host supports range requests, streaming on demand");
            tokio::task::spawn_blocking(move || {
                let reader = HttpRangeReader::new(blocking_client, url, len);
                ZipFiler::from_reader(reader, &prefix)
            })
            .await
            .map_err(|e| ValidationError::upstream(format!("archive read task failed: {e}")))??
        } else {
            tracing::debug!(module = %module, "archive host has no range support, buffering through tiered store");
            let store = TieredByteStore::collect(response.bytes_stream(), MEMORY_TIER_LIMIT, FILE_TIER_LIMIT).await?;
            ZipFiler::from_reader(store, &prefix)?
        };

        self.detector.detect(&filer).await
    }
}

impl<D: LicenseDetector> LicenseResolver for ArchiveResolver<D> {
    fn resolve_license<'a>(&'a self, module: &'a Module) -> ResolveFuture<'a> {
        Box::pin(self.resolve(module))
    }
}
