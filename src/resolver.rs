//! Track resolver — turns raw user input into normalized track descriptors.
//!
//! A URL matching a known provider shape routes directly to that
//! provider's resolve capability (expanding albums and playlists into one
//! descriptor per track). Anything else is treated as a free-text search
//! query against a caller-chosen provider, yielding a lazy, finite,
//! non-restartable stream of ranked candidates.

use regex::Regex;
use std::sync::Arc;
use std::sync::LazyLock;
use tokio_stream::wrappers::ReceiverStream;

use crate::config::{AlbumOrder, ProviderConfig};
use crate::error::{Error, Result};
use crate::providers::{AdapterSet, ReferenceKind, Resolution};
use crate::types::{Provider, TrackDescriptor};

#[allow(clippy::expect_used)]
static DEEZER_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https?://(?:www\.)?deezer\.com/(?:[a-z]{2}(?:-[a-z]{2})?/)?(track|album|playlist)/(\d+)",
    )
    .expect("static regex")
});

#[allow(clippy::expect_used)]
static SOUNDCLOUD_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https?://(?:www\.|m\.)?soundcloud\.com/([^/?#\s]+)/(?:(sets)/)?([^/?#\s]+)/?(?:[?#].*)?$",
    )
    .expect("static regex")
});

/// Classify raw input as a provider reference or a search query.
///
/// Returns the provider, the kind of reference the URL denotes, and the
/// provider-native reference (id or permalink). `None` means the input is
/// not a recognized provider URL and should be treated as a search query.
pub fn classify(input: &str) -> Option<(Provider, ReferenceKind, String)> {
    let input = input.trim();

    if let Some(captures) = DEEZER_URL.captures(input) {
        let kind = match &captures[1] {
            "track" => ReferenceKind::Track,
            "album" => ReferenceKind::Album,
            _ => ReferenceKind::Playlist,
        };
        return Some((Provider::Deezer, kind, captures[2].to_string()));
    }

    if let Some((kind, reference)) = classify_youtube(input) {
        return Some((Provider::Youtube, kind, reference));
    }

    if let Some(captures) = SOUNDCLOUD_URL.captures(input) {
        let artist = &captures[1];
        let slug = &captures[3];
        return if captures.get(2).is_some() {
            Some((
                Provider::Soundcloud,
                ReferenceKind::Playlist,
                format!("{}/sets/{}", artist, slug),
            ))
        } else {
            Some((
                Provider::Soundcloud,
                ReferenceKind::Track,
                format!("{}/{}", artist, slug),
            ))
        };
    }

    None
}

fn classify_youtube(input: &str) -> Option<(ReferenceKind, String)> {
    let parsed = url::Url::parse(input).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let host = parsed.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    let host = host.strip_prefix("m.").unwrap_or(host);
    let host = host.strip_prefix("music.").unwrap_or(host);

    match host {
        "youtu.be" => {
            let id = parsed.path_segments()?.next()?.to_string();
            if id.is_empty() {
                None
            } else {
                Some((ReferenceKind::Track, id))
            }
        }
        "youtube.com" => match parsed.path() {
            "/watch" => parsed
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, v)| (ReferenceKind::Track, v.into_owned())),
            "/playlist" => parsed
                .query_pairs()
                .find(|(key, _)| key == "list")
                .map(|(_, v)| (ReferenceKind::Playlist, v.into_owned())),
            _ => None,
        },
        _ => None,
    }
}

/// A lazy, finite, non-restartable stream of ranked search candidates.
///
/// Candidates arrive in provider ranking order. Once consumed, an item is
/// gone; dropping the stream abandons the remaining candidates.
pub struct CandidateStream {
    inner: ReceiverStream<TrackDescriptor>,
}

impl CandidateStream {
    /// The next ranked candidate, or `None` when the results are exhausted
    pub async fn next(&mut self) -> Option<TrackDescriptor> {
        use tokio_stream::StreamExt;
        self.inner.next().await
    }
}

impl tokio_stream::Stream for CandidateStream {
    type Item = TrackDescriptor;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        std::pin::Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// Resolves raw user input into track descriptors via the adapter set
pub struct TrackResolver {
    adapters: Arc<AdapterSet>,
    album_order: AlbumOrder,
    search_limit: usize,
    search_provider: Provider,
}

impl TrackResolver {
    /// Create a resolver over an adapter set
    pub fn new(adapters: Arc<AdapterSet>, config: &ProviderConfig) -> Self {
        Self {
            adapters,
            album_order: config.album_order,
            search_limit: config.search_limit,
            search_provider: config.search_provider,
        }
    }

    /// Resolve raw input into the tracks a job should fetch.
    ///
    /// Provider URLs resolve directly (albums and playlists expand into
    /// one descriptor per track, sharing the album reference). Free-text
    /// input searches the configured provider and takes the top-ranked
    /// candidate. Fails with [`Error::UnresolvedInput`] when nothing
    /// matches.
    pub async fn resolve_input(&self, input: &str) -> Result<Vec<TrackDescriptor>> {
        match classify(input) {
            Some((provider, kind, reference)) => {
                let adapter = self.adapters.get(provider);
                let tracks = match adapter.resolve(&reference, kind).await? {
                    Resolution::Track(track) => vec![track],
                    Resolution::Collection { tracks } => self.order_collection(tracks),
                };
                if tracks.is_empty() {
                    return Err(Error::UnresolvedInput(input.to_string()));
                }
                Ok(tracks)
            }
            None => {
                let adapter = self.adapters.get(self.search_provider);
                let mut results = adapter.search(input, self.search_limit).await?;
                if results.is_empty() {
                    return Err(Error::UnresolvedInput(input.to_string()));
                }
                Ok(vec![results.remove(0)])
            }
        }
    }

    /// Search one provider, returning a lazy candidate stream for the
    /// caller to pick from (inline mode searches a single provider).
    pub fn search(&self, query: &str, provider: Provider) -> CandidateStream {
        let (tx, rx) = tokio::sync::mpsc::channel(8);
        let adapter = self.adapters.get(provider);
        let query = query.to_string();
        let limit = self.search_limit;

        tokio::spawn(async move {
            match adapter.search(&query, limit).await {
                Ok(candidates) => {
                    for candidate in candidates {
                        if tx.send(candidate).await.is_err() {
                            // Consumer dropped the stream; abandon the rest.
                            break;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(query = %query, error = %e, "search failed");
                }
            }
        });

        CandidateStream {
            inner: ReceiverStream::new(rx),
        }
    }

    fn order_collection(&self, mut tracks: Vec<TrackDescriptor>) -> Vec<TrackDescriptor> {
        match self.album_order {
            AlbumOrder::ProviderNative => tracks,
            AlbumOrder::ByTitle => {
                tracks.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));
                tracks
            }
        }
    }
}
