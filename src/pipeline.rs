//! Format pipeline — turns a raw provider stream into a finished artifact.
//!
//! The pipeline owns the decision logic: target codec from quality tier
//! and what the provider actually delivered, cover-art embedding per the
//! delivery configuration, and deterministic output filenames. The actual
//! transcoding is delegated to an [`Encoder`], whose production
//! implementation shells out to ffmpeg and writes tags and cover art with
//! lofty.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, ToolsConfig};
use crate::error::{EncodeError, Error, Result};
use crate::providers::RawAudio;
use crate::types::{Artifact, Codec, QualityTier, TagSet, TrackDescriptor};
use crate::utils::track_filename;

/// Everything an encoder needs for one track
#[derive(Clone, Debug)]
pub struct EncodeSpec {
    /// Target codec
    pub codec: Codec,
    /// Target bitrate in kbit/s, for lossy codecs
    pub bitrate_kbps: Option<u32>,
    /// Tags to embed
    pub tags: TagSet,
    /// Cover-art bytes to embed, when covers are enabled and available
    pub cover: Option<Vec<u8>>,
    /// Whether the stream needs transcoding, or only tagging
    pub reencode: bool,
}

/// External encoder/tag-writer capability.
///
/// `encode` must produce a playable file at `output` with the spec's tags
/// (and cover, when present) embedded.
#[async_trait::async_trait]
pub trait Encoder: Send + Sync {
    /// Encode (or copy) `input` to `output` per the spec and write tags
    async fn encode(&self, input: &Path, output: &Path, spec: &EncodeSpec)
    -> std::result::Result<(), EncodeError>;
}

/// Production [`Encoder`] that shells out to ffmpeg for transcoding and
/// writes tags and cover art with lofty.
pub struct FfmpegEncoder {
    binary: PathBuf,
}

impl FfmpegEncoder {
    /// Use an explicit ffmpeg binary
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }

    /// Locate ffmpeg from the tools configuration: an explicit path wins,
    /// otherwise PATH is searched when allowed.
    pub fn discover(tools: &ToolsConfig) -> std::result::Result<Self, EncodeError> {
        if let Some(path) = &tools.ffmpeg_path {
            return Ok(Self::new(path.clone()));
        }
        if tools.search_path {
            return which::which("ffmpeg")
                .map(Self::new)
                .map_err(|_| EncodeError::EncoderMissing);
        }
        Err(EncodeError::EncoderMissing)
    }

    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        spec: &EncodeSpec,
    ) -> std::result::Result<(), EncodeError> {
        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.arg("-i").arg(input).arg("-vn");
        match spec.codec {
            Codec::Mp3 => {
                cmd.arg("-acodec").arg("libmp3lame");
                if let Some(kbps) = spec.bitrate_kbps {
                    cmd.arg("-b:a").arg(format!("{}k", kbps));
                }
            }
            Codec::Flac => {
                cmd.arg("-acodec").arg("flac");
            }
        }
        cmd.arg("-loglevel").arg("error").arg("-y").arg(output);

        let result = cmd.output().await.map_err(|e| EncodeError::Failed {
            track: spec.tags.title.clone(),
            reason: format!("failed to run ffmpeg: {}", e),
        })?;

        if !result.status.success() {
            return Err(EncodeError::Failed {
                track: spec.tags.title.clone(),
                reason: format!(
                    "ffmpeg exited with {}: {}",
                    result.status,
                    String::from_utf8_lossy(&result.stderr).trim()
                ),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Encoder for FfmpegEncoder {
    async fn encode(
        &self,
        input: &Path,
        output: &Path,
        spec: &EncodeSpec,
    ) -> std::result::Result<(), EncodeError> {
        if spec.reencode {
            self.transcode(input, output, spec).await?;
        } else {
            // Container already matches the target codec; tag-only pass.
            tokio::fs::copy(input, output)
                .await
                .map_err(|e| EncodeError::Failed {
                    track: spec.tags.title.clone(),
                    reason: format!("failed to copy stream: {}", e),
                })?;
        }

        let path = output.to_path_buf();
        let spec = spec.clone();
        tokio::task::spawn_blocking(move || write_tags(&path, &spec))
            .await
            .map_err(|e| EncodeError::Failed {
                track: "unknown".to_string(),
                reason: format!("tag writer panicked: {}", e),
            })?
    }
}

/// Write tags and cover art with lofty
fn write_tags(path: &Path, spec: &EncodeSpec) -> std::result::Result<(), EncodeError> {
    use lofty::config::WriteOptions;
    use lofty::file::{AudioFile, TaggedFileExt};
    use lofty::picture::Picture;
    use lofty::read_from_path;
    use lofty::tag::{ItemKey, Tag, TagType};

    let failed = |reason: String| EncodeError::Failed {
        track: spec.tags.title.clone(),
        reason,
    };

    let mut tagged = read_from_path(path).map_err(|e| failed(format!("read: {}", e)))?;

    let tag_type = match spec.codec {
        Codec::Flac => TagType::VorbisComments,
        Codec::Mp3 => TagType::Id3v2,
    };
    if tagged.primary_tag_mut().is_none() {
        tagged.insert_tag(Tag::new(tag_type));
    }
    let Some(tag) = tagged.primary_tag_mut() else {
        return Err(failed("no writable tag".to_string()));
    };

    tag.insert_text(ItemKey::TrackTitle, spec.tags.title.clone());
    tag.insert_text(ItemKey::TrackArtist, spec.tags.artist.clone());
    if let Some(album) = &spec.tags.album {
        tag.insert_text(ItemKey::AlbumTitle, album.clone());
    }
    if let Some(number) = spec.tags.track_number {
        tag.insert_text(ItemKey::TrackNumber, number.to_string());
    }
    if let Some(cover) = &spec.cover {
        match Picture::from_reader(&mut cover.as_slice()) {
            Ok(picture) => tag.set_picture(0, picture),
            Err(e) => tracing::warn!(error = %e, "cover bytes not embeddable, skipping"),
        }
    }

    tagged
        .save_to_path(path, WriteOptions::default())
        .map_err(|e| failed(format!("save tags: {}", e)))
}

/// Normalizes a fetched raw stream into a final encoded artifact
pub struct FormatPipeline {
    encoder: Arc<dyn Encoder>,
    http: reqwest::Client,
    covers_enabled: bool,
    cover_timeout: Duration,
    encode_timeout: Duration,
}

impl FormatPipeline {
    /// Create a pipeline over an encoder, taking its toggles from config
    pub fn new(encoder: Arc<dyn Encoder>, config: &Config) -> Self {
        Self {
            encoder,
            http: reqwest::Client::new(),
            covers_enabled: config.delivery.covers_enabled(),
            cover_timeout: config.download.cover_timeout,
            encode_timeout: config.download.encode_timeout,
        }
    }

    /// Target codec for a track: lossless only when the tier is lossless
    /// *and* the provider actually delivered a lossless stream. Everything
    /// else becomes MP3 — transcoding a lossy stream into FLAC would only
    /// inflate it.
    pub fn target_codec(quality: QualityTier, raw: &RawAudio) -> Codec {
        match (quality, raw.container) {
            (QualityTier::Lossless, crate::types::Container::Flac) => Codec::Flac,
            _ => Codec::Mp3,
        }
    }

    /// Process one fetched stream into a finished artifact in `out_dir`.
    ///
    /// Failures are reported as [`EncodeError`] so that a bad track stays
    /// a per-track problem.
    pub async fn process(
        &self,
        raw: RawAudio,
        track: &TrackDescriptor,
        quality: QualityTier,
        out_dir: &Path,
    ) -> Result<Artifact> {
        let codec = Self::target_codec(quality, &raw);
        let filename = track_filename(&track.artist, &track.title, codec.extension());
        let output = out_dir.join(&filename);

        let cover = if self.covers_enabled {
            self.fetch_cover(track).await
        } else {
            None
        };

        let spec = EncodeSpec {
            codec,
            bitrate_kbps: match codec {
                Codec::Mp3 => Some(320),
                Codec::Flac => None,
            },
            tags: TagSet::from(track),
            cover,
            reencode: !raw.container.matches(codec),
        };

        match tokio::time::timeout(
            self.encode_timeout,
            self.encoder.encode(&raw.path, &output, &spec),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(Error::Encode(e)),
            Err(_) => {
                return Err(Error::Encode(EncodeError::Failed {
                    track: track.title.clone(),
                    reason: format!("encoder timed out after {:?}", self.encode_timeout),
                }));
            }
        }

        if raw.path != output {
            // Raw stream is consumed; the artifact is what survives.
            let _ = tokio::fs::remove_file(&raw.path).await;
        }

        let size_bytes = tokio::fs::metadata(&output)
            .await
            .map_err(|e| {
                Error::Encode(EncodeError::Failed {
                    track: track.title.clone(),
                    reason: format!("artifact missing after encode: {}", e),
                })
            })?
            .len();

        tracing::debug!(
            track = %track.id,
            artifact = %output.display(),
            size_bytes,
            codec = %codec,
            "track encoded"
        );

        Ok(Artifact {
            path: output,
            size_bytes,
            codec,
            tags: spec.tags,
        })
    }

    /// Fetch cover-art bytes for a track. Failure is never fatal — the
    /// artifact simply ships without art.
    pub(crate) async fn fetch_cover(&self, track: &TrackDescriptor) -> Option<Vec<u8>> {
        let url = track.cover_url.as_deref()?;
        let fetch = async {
            let response = self.http.get(url).send().await?.error_for_status()?;
            let bytes = response.bytes().await?;
            Ok::<_, reqwest::Error>(bytes.to_vec())
        };
        match tokio::time::timeout(self.cover_timeout, fetch).await {
            Ok(Ok(bytes)) => Some(bytes),
            Ok(Err(e)) => {
                tracing::warn!(track = %track.id, error = %e, "cover download failed, continuing without art");
                None
            }
            Err(_) => {
                tracing::warn!(track = %track.id, "cover download timed out, continuing without art");
                None
            }
        }
    }
}
