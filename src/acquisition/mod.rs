//! Multi-source acquisition chain
//!
//! Given an item id, each enabled source is tried in priority order until one
//! of them yields a payload that passes validation. Every failure is recorded
//! and the chain moves on; a source is never retried within one acquisition.

mod payload;


pub use payload::{Payload, PayloadFormat};

use crate::config::NetworkConfig;
use crate::error::{AcquisitionError, Error, Result, SourceFailure, SourceFailureReason};
use crate::sources::{SourceRegistry, SourceSpec};
use crate::types::{ItemId, TransferStats};
use crate::utils::extract_filename_from_response;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;

/// Number of leading bytes kept for signature sniffing
const SNIFF_LEN: usize = 8;

/// Runs the ordered source chain for one item at a time
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone, Debug)]
pub struct AcquisitionChain {
    client: reqwest::Client,
    request_timeout: Duration,
    write_timeout: Duration,
}

struct Streamed {
    bytes: u64,
    elapsed: Duration,
    head: Vec<u8>,
}

impl AcquisitionChain {
    /// Build a chain whose HTTP client honors the configured timeouts
    pub fn new(network: &NetworkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(network.connect_timeout)
            .user_agent(network.user_agent.clone())
            .build()
            .map_err(Error::Network)?;

        Ok(Self {
            client,
            request_timeout: network.request_timeout,
            write_timeout: network.write_timeout,
        })
    }

    /// Try every enabled source in order and return the first valid payload
    ///
    /// The payload is left in `temp_dir` as `<id>.<ext>`; the caller owns it
    /// from then on.
    pub async fn acquire(
        &self,
        id: ItemId,
        sources: &SourceRegistry,
        temp_dir: &Path,
    ) -> std::result::Result<Payload, AcquisitionError> {
        if !sources.has_enabled() {
            tracing::warn!(item_id = %id, "no enabled sources configured");
            return Err(AcquisitionError::NoEnabledSources);
        }

        let total = sources.len();
        let mut attempts = Vec::new();

        for spec in sources.enabled() {
            tracing::debug!(
                item_id = %id,
                source = %spec.name,
                position = spec.position,
                total,
                "trying source"
            );

            match self.try_source(id, spec, temp_dir).await {
                Ok(payload) => {
                    tracing::info!(
                        item_id = %id,
                        source = %spec.name,
                        position = spec.position,
                        format = %payload.format,
                        bytes = payload.stats.bytes,
                        "payload acquired"
                    );
                    return Ok(payload);
                }
                Err(reason) => {
                    tracing::warn!(
                        item_id = %id,
                        source = %spec.name,
                        position = spec.position,
                        total,
                        error = %reason,
                        "source failed, advancing"
                    );
                    attempts.push(SourceFailure {
                        source: spec.name.clone(),
                        position: spec.position,
                        reason,
                    });
                }
            }
        }

        Err(AcquisitionError::ChainExhausted { attempts })
    }

    async fn try_source(
        &self,
        id: ItemId,
        spec: &SourceSpec,
        temp_dir: &Path,
    ) -> std::result::Result<Payload, SourceFailureReason> {
        let url = spec.url_for(id);

        let mut response = tokio::time::timeout(self.request_timeout, self.client.get(&url).send())
            .await
            .map_err(|_| SourceFailureReason::Timeout {
                stage: "waiting for response",
            })?
            .map_err(map_request_error)?;

        let status = response.status().as_u16();
        if status == spec.unavailable_code {
            return Err(SourceFailureReason::NotAvailable { status });
        }
        if status != spec.success_code {
            return Err(SourceFailureReason::UnexpectedStatus { status });
        }

        let advertised_name = extract_filename_from_response(&response, &url);

        tokio::fs::create_dir_all(temp_dir)
            .await
            .map_err(|e| SourceFailureReason::Io(e.to_string()))?;
        let part_path = temp_dir.join(format!("{}-{}.part", id, spec.position));

        let streamed = match self.stream_body(&mut response, &part_path).await {
            Ok(streamed) => streamed,
            Err(reason) => {
                discard(&part_path).await;
                return Err(reason);
            }
        };

        match self
            .finalize(id, spec, &part_path, temp_dir, streamed, advertised_name)
            .await
        {
            Ok(payload) => Ok(payload),
            Err(reason) => {
                discard(&part_path).await;
                Err(reason)
            }
        }
    }

    /// Stream the body to `part_path`, bounding every read and every write
    async fn stream_body(
        &self,
        response: &mut reqwest::Response,
        part_path: &Path,
    ) -> std::result::Result<Streamed, SourceFailureReason> {
        let mut file = tokio::fs::File::create(part_path)
            .await
            .map_err(|e| SourceFailureReason::Io(e.to_string()))?;

        let mut bytes = 0u64;
        let mut head = Vec::with_capacity(SNIFF_LEN);
        let mut started: Option<Instant> = None;

        loop {
            let chunk = tokio::time::timeout(self.request_timeout, response.chunk())
                .await
                .map_err(|_| SourceFailureReason::Timeout {
                    stage: "reading body",
                })?
                .map_err(map_request_error)?;

            let Some(chunk) = chunk else { break };
            started.get_or_insert_with(Instant::now);

            if head.len() < SNIFF_LEN {
                let take = (SNIFF_LEN - head.len()).min(chunk.len());
                head.extend_from_slice(&chunk[..take]);
            }

            tokio::time::timeout(self.write_timeout, file.write_all(&chunk))
                .await
                .map_err(|_| SourceFailureReason::Timeout {
                    stage: "writing payload",
                })?
                .map_err(|e| SourceFailureReason::Io(e.to_string()))?;
            bytes += chunk.len() as u64;
        }

        tokio::time::timeout(self.write_timeout, file.flush())
            .await
            .map_err(|_| SourceFailureReason::Timeout {
                stage: "writing payload",
            })?
            .map_err(|e| SourceFailureReason::Io(e.to_string()))?;

        Ok(Streamed {
            bytes,
            elapsed: started.map(|s| s.elapsed()).unwrap_or_default(),
            head,
        })
    }

    /// Validate the streamed file and move it to its final name
    async fn finalize(
        &self,
        id: ItemId,
        spec: &SourceSpec,
        part_path: &Path,
        temp_dir: &Path,
        streamed: Streamed,
        advertised_name: Option<String>,
    ) -> std::result::Result<Payload, SourceFailureReason> {
        if streamed.bytes == 0 {
            return Err(SourceFailureReason::InvalidPayload("empty body".to_string()));
        }

        let format = payload::classify(&streamed.head, advertised_name.as_deref())?;

        if format == PayloadFormat::Script {
            let content = tokio::fs::read(part_path)
                .await
                .map_err(|e| SourceFailureReason::Io(e.to_string()))?;
            if std::str::from_utf8(&content).is_err() {
                return Err(SourceFailureReason::InvalidPayload(
                    "script is not valid UTF-8".to_string(),
                ));
            }
        }

        let final_name = format!("{}.{}", id, format.extension());
        let final_path: PathBuf = temp_dir.join(&final_name);
        tokio::fs::rename(part_path, &final_path)
            .await
            .map_err(|e| SourceFailureReason::Io(e.to_string()))?;

        Ok(Payload {
            path: final_path,
            format,
            stats: TransferStats::new(
                streamed.bytes,
                streamed.elapsed.as_secs_f64(),
                spec.name.clone(),
                final_name,
            ),
        })
    }
}

fn map_request_error(e: reqwest::Error) -> SourceFailureReason {
    if e.is_timeout() {
        SourceFailureReason::Timeout {
            stage: "connecting",
        }
    } else {
        SourceFailureReason::Connection(e.to_string())
    }
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!(path = ?path, error = %e, "failed to remove partial payload");
    }
}
