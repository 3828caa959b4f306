//! Out-of-process loader (spec.md §4.3, §6, §9): spawns a subprocess acting
//! as a remote module host and marshals `receive`/`publish` across its
//! stdin/stdout as framed canonical messages. The broker and gateway never
//! learn the module is remote — the handle this loader hands back is just
//! another opaque `ModuleInstance`.

use std::fmt;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::broker::Broker;
use crate::loader::error::LoaderError;
use crate::loader::traits::Loader;
use crate::loader::types::{LibraryHandle, LoaderType};
use crate::message::Message;
use crate::module::{ApiVersion, ModuleApi, ModuleError, ModuleInstance};

/// The frame kinds exchanged over the control channel (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum FrameKind {
    Create = 0,
    Start = 1,
    Destroy = 2,
    Publish = 3,
    PublishReply = 4,
}

impl FrameKind {
    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Create),
            1 => Some(Self::Start),
            2 => Some(Self::Destroy),
            3 => Some(Self::Publish),
            4 => Some(Self::PublishReply),
            _ => None,
        }
    }
}

async fn write_frame(
    stdin: &mut ChildStdin,
    kind: FrameKind,
    payload: &[u8],
) -> std::io::Result<()> {
    stdin.write_u8(kind as u8).await?;
    stdin.write_u32(payload.len() as u32).await?;
    stdin.write_all(payload).await?;
    stdin.flush().await
}

async fn read_frame(
    stdout: &mut BufReader<ChildStdout>,
) -> std::io::Result<(FrameKind, Vec<u8>)> {
    let tag = stdout.read_u8().await?;
    let kind = FrameKind::from_tag(tag).ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidData, "unknown control-channel frame kind")
    })?;
    let len = stdout.read_u32().await?;
    let mut payload = vec![0u8; len as usize];
    stdout.read_exact(&mut payload).await?;
    Ok((kind, payload))
}

/// The spawned child process plus its framed control channel. `stdout` is
/// `Some` until `create` hands it off to the reader task that forwards the
/// remote module's own `Publish` frames into the broker.
pub struct RemoteHost {
    module_name: String,
    child: Mutex<Child>,
    stdin: Mutex<ChildStdin>,
    stdout: Mutex<Option<ChildStdout>>,
}

impl fmt::Debug for RemoteHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteHost")
            .field("module_name", &self.module_name)
            .finish_non_exhaustive()
    }
}

impl RemoteHost {
    async fn send(&self, kind: FrameKind, payload: &[u8]) -> Result<(), LoaderError> {
        let mut stdin = self.stdin.lock().await;
        write_frame(&mut stdin, kind, payload)
            .await
            .map_err(|e| LoaderError::Transport {
                loader: "out_of_process".to_string(),
                reason: e.to_string(),
            })
    }
}

/// Spawns (or, in principle, attaches to) a remote module host process by
/// the channel token named in the entry point (spec.md §6).
pub struct OutOfProcessLoader {
    name: String,
}

impl OutOfProcessLoader {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Loader for OutOfProcessLoader {
    fn loader_type(&self) -> LoaderType {
        LoaderType::OutOfProcess
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self, entrypoint: &Value) -> Result<LibraryHandle, LoaderError> {
        let command = entrypoint
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| LoaderError::InvalidEntrypoint {
                loader: self.name.clone(),
                reason: "entry point is missing a `command` field".to_string(),
            })?;
        let args: Vec<String> = entrypoint
            .get("args")
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let module_name = entrypoint
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("remote")
            .to_string();

        let mut child = Command::new(command)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| LoaderError::Load {
                loader: self.name.clone(),
                reason: format!("failed to spawn `{command}`: {e}"),
            })?;

        let stdin = child.stdin.take().ok_or_else(|| LoaderError::Load {
            loader: self.name.clone(),
            reason: "child process stdin was not piped".to_string(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| LoaderError::Load {
            loader: self.name.clone(),
            reason: "child process stdout was not piped".to_string(),
        })?;

        let host = Arc::new(RemoteHost {
            module_name,
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            stdout: Mutex::new(Some(stdout)),
        });

        Ok(LibraryHandle::OutOfProcess(host))
    }

    async fn unload(&self, handle: LibraryHandle) -> Result<(), LoaderError> {
        if let LibraryHandle::OutOfProcess(host) = handle {
            let mut child = host.child.lock().await;
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
        Ok(())
    }

    async fn get_api(&self, handle: &LibraryHandle) -> Result<Arc<dyn ModuleApi>, LoaderError> {
        match handle {
            LibraryHandle::OutOfProcess(host) => Ok(Arc::new(OutOfProcessModuleApi {
                host: Arc::clone(host),
            })),
            LibraryHandle::Native { .. } | LibraryHandle::Opaque(_) => {
                Err(LoaderError::MismatchedHandle {
                    loader: self.name.clone(),
                })
            }
        }
    }
}

struct OutOfProcessModuleApi {
    host: Arc<RemoteHost>,
}

#[async_trait]
impl ModuleApi for OutOfProcessModuleApi {
    fn api_version(&self) -> ApiVersion {
        ApiVersion::CURRENT
    }

    async fn create(
        &self,
        broker: Broker,
        config: Value,
    ) -> Result<Arc<dyn ModuleInstance>, ModuleError> {
        let payload = serde_json::to_vec(&config).unwrap_or_default();
        self.host
            .send(FrameKind::Create, &payload)
            .await
            .map_err(|e| ModuleError::Creation {
                reason: e.to_string(),
            })?;

        let stdout = self.host.stdout.lock().await.take();

        if let Some(stdout) = stdout {
            let host = Arc::clone(&self.host);
            tokio::spawn(remote_publish_reader(host, BufReader::new(stdout), broker));
        }

        Ok(Arc::new(OutOfProcessModuleInstance {
            host: Arc::clone(&self.host),
        }))
    }
}

/// Reads `Publish` frames the remote module sends and forwards them to the
/// broker under the module's own name, acking each with `PublishReply`.
async fn remote_publish_reader(
    host: Arc<RemoteHost>,
    mut stdout: BufReader<ChildStdout>,
    broker: Broker,
) {
    loop {
        let (kind, payload) = match read_frame(&mut stdout).await {
            Ok(frame) => frame,
            Err(e) => {
                debug!(module = %host.module_name, error = %e, "remote module control channel closed");
                return;
            }
        };

        if kind != FrameKind::Publish {
            warn!(module = %host.module_name, ?kind, "unexpected frame kind from remote module");
            continue;
        }

        match Message::from_bytes(&payload) {
            Ok(message) => {
                if let Err(e) = broker.publish(&host.module_name, message) {
                    warn!(module = %host.module_name, error = %e, "failed to publish message from remote module");
                }
            }
            Err(e) => warn!(module = %host.module_name, error = %e, "remote module sent a malformed message"),
        }

        if let Err(e) = host.send(FrameKind::PublishReply, &[]).await {
            debug!(module = %host.module_name, error = %e, "failed to ack remote publish");
            return;
        }
    }
}

struct OutOfProcessModuleInstance {
    host: Arc<RemoteHost>,
}

#[async_trait]
impl ModuleInstance for OutOfProcessModuleInstance {
    async fn receive(&self, message: Message) {
        let bytes = message.to_bytes();
        if let Err(e) = self.host.send(FrameKind::Publish, &bytes).await {
            warn!(module = %self.host.module_name, error = %e, "failed to deliver message to remote module");
        }
    }

    async fn start(&self) -> Result<(), ModuleError> {
        self.host
            .send(FrameKind::Start, &[])
            .await
            .map_err(|e| ModuleError::Creation {
                reason: e.to_string(),
            })
    }
}

impl Drop for OutOfProcessModuleInstance {
    fn drop(&mut self) {
        let host = Arc::clone(&self.host);
        tokio::spawn(async move {
            let _ = host.send(FrameKind::Destroy, &[]).await;
        });
    }
}
