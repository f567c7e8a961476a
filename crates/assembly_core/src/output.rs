use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use ports::{ResourceHandle, ResourceHost, SaveTrigger};
use shared::{
    domain::{SaveOutcome, DEFAULT_OUTPUT_NAME, PDF_MEDIA_TYPE},
    error::DeliveryError,
};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, info, warn};

/// Publishes merged bytes as a resource, hands it to the save action, and
/// releases the resource whatever the save action did.
pub struct OutputEmitter {
    host: Arc<dyn ResourceHost>,
    trigger: Arc<dyn SaveTrigger>,
    file_name: String,
}

impl OutputEmitter {
    pub fn new(host: Arc<dyn ResourceHost>, trigger: Arc<dyn SaveTrigger>) -> Self {
        Self {
            host,
            trigger,
            file_name: DEFAULT_OUTPUT_NAME.to_string(),
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub async fn emit(&self, bytes: Vec<u8>) -> Result<SaveOutcome, DeliveryError> {
        let byte_len = bytes.len();
        let handle = self
            .host
            .create(bytes, PDF_MEDIA_TYPE)
            .map_err(|err| DeliveryError::Publish {
                reason: format!("{err:#}"),
            })?;
        let resource = ScopedResource {
            host: self.host.as_ref(),
            handle,
        };
        debug!(handle = %resource.handle, bytes = byte_len, "output: published resource");

        let outcome = self
            .trigger
            .trigger(self.host.as_ref(), &resource.handle, &self.file_name)
            .await
            .map_err(|err| DeliveryError::Save {
                reason: format!("{err:#}"),
            });
        match &outcome {
            Ok(SaveOutcome::Saved { location }) => {
                info!(file_name = %self.file_name, %location, "output: saved")
            }
            Ok(SaveOutcome::Cancelled) => {
                info!(file_name = %self.file_name, "output: save cancelled")
            }
            Err(err) => {
                warn!(file_name = %self.file_name, error = %err, "output: save failed")
            }
        }
        outcome
    }
}

struct ScopedResource<'a> {
    host: &'a dyn ResourceHost,
    handle: ResourceHandle,
}

impl Drop for ScopedResource<'_> {
    fn drop(&mut self) {
        self.host.release(&self.handle);
        debug!(handle = %self.handle, "output: released resource");
    }
}

#[derive(Debug)]
struct StoredResource {
    bytes: Arc<[u8]>,
    media_type: String,
}

/// Process-local resource host. Handles are `mem:<n>` and never reused.
#[derive(Debug, Default)]
pub struct InMemoryResourceHost {
    resources: Mutex<HashMap<ResourceHandle, StoredResource>>,
    next_handle: AtomicU64,
}

impl InMemoryResourceHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_handles(&self) -> usize {
        self.resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn media_type(&self, handle: &ResourceHandle) -> Option<String> {
        self.resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(handle)
            .map(|resource| resource.media_type.clone())
    }
}

impl ResourceHost for InMemoryResourceHost {
    fn create(&self, bytes: Vec<u8>, media_type: &str) -> Result<ResourceHandle> {
        let handle = ResourceHandle(format!(
            "mem:{}",
            self.next_handle.fetch_add(1, Ordering::Relaxed) + 1
        ));
        self.resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                handle.clone(),
                StoredResource {
                    bytes: Arc::from(bytes),
                    media_type: media_type.to_string(),
                },
            );
        Ok(handle)
    }

    fn fetch(&self, handle: &ResourceHandle) -> Option<Arc<[u8]>> {
        self.resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(handle)
            .map(|resource| Arc::clone(&resource.bytes))
    }

    fn release(&self, handle: &ResourceHandle) {
        self.resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(handle);
    }
}

/// Saves into a directory. Without `overwrite`, an existing file is kept and
/// the output lands at the first free `stem (n).ext`.
#[derive(Debug, Clone)]
pub struct DirectorySaveTrigger {
    dir: PathBuf,
    overwrite: bool,
}

impl DirectorySaveTrigger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            overwrite: false,
        }
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn write(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).await.with_context(|| {
            format!("failed to create output directory '{}'", self.dir.display())
        })?;

        let path = self.dir.join(file_name);
        if self.overwrite {
            fs::write(&path, bytes)
                .await
                .with_context(|| format!("failed to write '{}'", path.display()))?;
            return Ok(path);
        }

        let (stem, extension) = split_file_name(file_name);
        for attempt in 0u32.. {
            let candidate = match attempt {
                0 => path.clone(),
                n => self.dir.join(format!("{stem} ({n}){extension}")),
            };
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&candidate)
                .await
            {
                Ok(mut file) => {
                    file.write_all(bytes)
                        .await
                        .with_context(|| format!("failed to write '{}'", candidate.display()))?;
                    file.flush()
                        .await
                        .with_context(|| format!("failed to flush '{}'", candidate.display()))?;
                    return Ok(candidate);
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
                Err(err) => {
                    return Err(err)
                        .with_context(|| format!("failed to create '{}'", candidate.display()))
                }
            }
        }
        Err(anyhow!("no free file name for '{file_name}'"))
    }
}

#[async_trait]
impl SaveTrigger for DirectorySaveTrigger {
    async fn trigger(
        &self,
        host: &dyn ResourceHost,
        handle: &ResourceHandle,
        file_name: &str,
    ) -> Result<SaveOutcome> {
        let bytes = host
            .fetch(handle)
            .ok_or_else(|| anyhow!("resource {handle} is no longer available"))?;
        let path = self.write(file_name, &bytes).await?;
        Ok(SaveOutcome::Saved {
            location: path.display().to_string(),
        })
    }
}

fn split_file_name(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(dot) if dot > 0 => file_name.split_at(dot),
        _ => (file_name, ""),
    }
}
