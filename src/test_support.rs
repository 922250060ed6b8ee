//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};

use crate::rest::{Transport, TransportError, TransportFuture, WireRequest, WireResponse};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scripted transport that returns pre-seeded responses in FIFO order.
///
/// Used to drive deterministic wire outcomes without a network. Clones share
/// the same script and request log, so a test keeps one handle for
/// assertions while the clients under test own another.
#[derive(Clone, Debug, Default)]
pub struct StubTransport {
    responses: Arc<Mutex<VecDeque<Result<WireResponse, TransportError>>>>,
    requests: Arc<Mutex<Vec<WireRequest>>>,
}

impl StubTransport {
    /// Creates a transport with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all requests recorded so far.
    #[must_use]
    pub fn requests(&self) -> Vec<WireRequest> {
        lock(&self.requests).clone()
    }

    /// Pushes a response with the given status and body.
    pub fn push_response(&self, status: u16, body: impl Into<String>) {
        lock(&self.responses).push_back(Ok(WireResponse::new(status, body)));
    }

    /// Pushes a response with the given status and an empty body.
    pub fn push_status(&self, status: u16) {
        self.push_response(status, "");
    }

    /// Pushes a transport failure.
    pub fn push_transport_error(&self, error: TransportError) {
        lock(&self.responses).push_back(Err(error));
    }
}

impl Transport for StubTransport {
    fn execute(&self, request: WireRequest) -> TransportFuture<'_, WireResponse> {
        let url = request.url.clone();
        lock(&self.requests).push(request);
        let scripted = lock(&self.responses).pop_front();
        Box::pin(async move {
            scripted.unwrap_or_else(|| {
                Err(TransportError::Request {
                    url,
                    message: String::from("no scripted response available"),
                })
            })
        })
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and cleans up variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: AsyncMutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push((key.to_string(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}

fn json_tagged_items(items: &[(&str, &str, Option<&str>)], status: &str) -> String {
    items
        .iter()
        .map(|(id, name, run_id)| {
            let metadata = run_id.map_or_else(String::new, |value| {
                format!("\"{}\":\"{value}\"", crate::cleanup::TEST_RUN_METADATA_KEY)
            });
            format!(
                "{{\"id\":\"{id}\",\"name\":\"{name}\",\"status\":\"{status}\",\"metadata\":{{{metadata}}}}}"
            )
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Produces a volume list document as returned by `GET volumes/detail`.
///
/// Each entry is `(id, name, run id tag)`; the tag lands in the volume
/// metadata under the test-run key when present.
#[must_use]
pub fn json_volume_list(volumes: &[(&str, &str, Option<&str>)]) -> String {
    format!("{{\"volumes\":[{}]}}", json_tagged_items(volumes, "available"))
}

/// Produces a snapshot list document as returned by `GET snapshots/detail`.
#[must_use]
pub fn json_snapshot_list(snapshots: &[(&str, &str, Option<&str>)]) -> String {
    format!(
        "{{\"snapshots\":[{}]}}",
        json_tagged_items(snapshots, "available")
    )
}

/// Produces a server list document as returned by `GET servers/detail`.
#[must_use]
pub fn json_server_list(servers: &[(&str, &str, Option<&str>)]) -> String {
    format!("{{\"servers\":[{}]}}", json_tagged_items(servers, "ACTIVE"))
}

/// Produces a volume type list document with `(id, name)` entries.
#[must_use]
pub fn json_volume_type_list(types: &[(&str, &str)]) -> String {
    let items = types
        .iter()
        .map(|(id, name)| format!("{{\"id\":\"{id}\",\"name\":\"{name}\"}}"))
        .collect::<Vec<_>>()
        .join(",");
    format!("{{\"volume_types\":[{items}]}}")
}

/// Produces a single snapshot document with the given identity and status.
#[must_use]
pub fn json_snapshot(id: &str, status: &str) -> String {
    format!(
        "{{\"snapshot\":{{\"id\":\"{id}\",\"status\":\"{status}\",\"volume_id\":\"vol-0\",\"size\":1,\"metadata\":{{}}}}}}"
    )
}

/// Produces a single volume document with the given identity and status.
#[must_use]
pub fn json_volume(id: &str, status: &str) -> String {
    format!(
        "{{\"volume\":{{\"id\":\"{id}\",\"status\":\"{status}\",\"size\":1,\"attachments\":[],\"metadata\":{{}}}}}}"
    )
}

/// Produces a single server document with the given identity and status.
#[must_use]
pub fn json_server(id: &str, status: &str) -> String {
    format!("{{\"server\":{{\"id\":\"{id}\",\"status\":\"{status}\",\"name\":\"zond-test\"}}}}")
}

/// Produces a single image document; the image API does not envelope.
#[must_use]
pub fn json_image(id: &str, status: &str) -> String {
    format!("{{\"id\":\"{id}\",\"status\":\"{status}\",\"name\":\"zond-test\"}}")
}

/// Produces a single volume type document with the given identity and name.
#[must_use]
pub fn json_volume_type(id: &str, name: &str) -> String {
    format!("{{\"volume_type\":{{\"id\":\"{id}\",\"name\":\"{name}\"}}}}")
}

/// Produces an encryption type document for the given volume type.
#[must_use]
pub fn json_encryption_type(volume_type_id: &str, provider: &str) -> String {
    format!(
        "{{\"encryption\":{{\"volume_type_id\":\"{volume_type_id}\",\"provider\":\"{provider}\",\"key_size\":256,\"cipher\":\"aes-xts-plain64\",\"control_location\":\"front-end\"}}}}"
    )
}

/// Produces a keypair document with the given name.
#[must_use]
pub fn json_keypair(name: &str) -> String {
    format!(
        "{{\"keypair\":{{\"name\":\"{name}\",\"public_key\":\"ssh-ed25519 AAAATESTKEY\"}}}}"
    )
}

/// Produces a volume attachment document.
#[must_use]
pub fn json_attachment(id: &str, server_id: &str, volume_id: &str) -> String {
    format!(
        "{{\"volumeAttachment\":{{\"id\":\"{id}\",\"serverId\":\"{server_id}\",\"volumeId\":\"{volume_id}\",\"device\":\"/dev/vdb\"}}}}"
    )
}

/// Produces a capability discovery document with a couple of entries.
#[must_use]
pub fn json_capabilities() -> String {
    String::from(
        "{\"swift\":{\"max_file_size\":5368709122},\"slo\":{\"min_segment_size\":1048576}}",
    )
}

/// Produces a volume usage summary document.
#[must_use]
pub fn json_volume_summary(total_size: u64, total_count: u64) -> String {
    format!(
        "{{\"volume-summary\":{{\"total_size\":{total_size},\"total_count\":{total_count}}}}}"
    )
}
