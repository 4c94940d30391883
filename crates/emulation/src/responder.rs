//! Docker Engine API surface emulation.
//!
//! [`EmulationResponder`] maps a captured request to a byte-for-byte
//! plausible daemon response. It validates preconditions against the
//! [`ResourceStore`], mutates store state, and synthesizes the response —
//! including the multi-chunk streamed bodies for pull/events and the
//! protocol-upgrade semantics Docker clients expect from attach/exec-start.
//!
//! Routing is an explicit match over normalized path segments. Every
//! endpoint accepts both the unversioned path and a `/v<version>/` prefixed
//! path identically; the prefix is stripped before dispatch.
//!
//! # Streaming and cancellation
//!
//! Store mutations complete before any streaming begins. The pull stream's
//! artificial delay lives in a spawned task holding only the channel sender,
//! so it suspends one client's body without blocking other requests, and a
//! mid-stream disconnect cannot corrupt store state.

use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::debug;

use docktrap_core::metrics as m;
use docktrap_core::types::CapturedRequest;

use crate::config::EmulationConfig;
use crate::response::EmulatedResponse;
use crate::store::{ContainerNetwork, ContainerRecord, ContainerSpec, ExecRecord, ResourceStore};

/// Canned privileged shell identity returned for `id` / `whoami` commands.
const SHELL_IDENTITY: &str = "uid=0(root) gid=0(root) groups=0(root)";

/// Content type of attach/exec raw streams.
const RAW_STREAM_CONTENT_TYPE: &str = "application/vnd.docker.raw-stream";

/// Attacker-supplied container-create body.
///
/// Every field is optional — the payload is adversarial and may omit or
/// mistype anything. Missing fields degrade to empty values, never to a
/// parse failure.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CreateContainerBody {
    #[serde(rename = "Image")]
    image: Option<String>,
    #[serde(rename = "Cmd")]
    cmd: Option<CmdField>,
    #[serde(rename = "Entrypoint")]
    entrypoint: Option<CmdField>,
    #[serde(rename = "Env")]
    env: Option<Vec<String>>,
}

/// Attacker-supplied exec-create body.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CreateExecBody {
    #[serde(rename = "Cmd")]
    cmd: Option<CmdField>,
}

/// Docker accepts both `"Cmd": ["sh", "-c"]` and `"Cmd": "sh -c"`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CmdField {
    List(Vec<String>),
    One(String),
}

impl CmdField {
    fn joined(&self) -> String {
        match self {
            Self::List(parts) => parts.join(" "),
            Self::One(s) => s.clone(),
        }
    }
}

/// The emulated Docker Engine API.
pub struct EmulationResponder {
    store: ResourceStore,
    config: EmulationConfig,
}

impl EmulationResponder {
    /// Creates a responder over the given store.
    pub fn new(store: ResourceStore, config: EmulationConfig) -> Self {
        Self { store, config }
    }

    /// Returns the backing resource store handle.
    pub fn store(&self) -> &ResourceStore {
        &self.store
    }

    /// Handles one captured request and synthesizes the daemon response.
    pub async fn handle(&self, req: &CapturedRequest) -> EmulatedResponse {
        let (api_version, normalized) = split_version_prefix(&req.path);
        let segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();

        let mut resp = self
            .dispatch(req.method.as_str(), api_version, &segments, req)
            .await;

        // Header mimicry: the real daemon stamps every response.
        for (name, value) in &self.config.mimic_headers {
            if !resp.has_header(name) {
                resp.headers.push((name.clone(), value.clone()));
            }
        }
        resp
    }

    async fn dispatch(
        &self,
        method: &str,
        api_version: Option<&str>,
        segments: &[&str],
        req: &CapturedRequest,
    ) -> EmulatedResponse {
        match (method, segments) {
            (_, ["_ping"]) => EmulatedResponse::text(200, "OK"),
            (_, ["version"]) => self.version(api_version),
            (_, ["info"]) => self.info(),

            ("POST", ["containers", "create"]) => self.create_container(req),
            (_, ["containers", "create"]) => EmulatedResponse::json(200, json!("")),
            (_, ["containers", "json"]) => self.list_containers(),
            (_, ["images", "json"]) => self.list_images(),
            ("POST", ["images", "create"]) => self.pull_image(req),
            ("POST", ["build"]) => EmulatedResponse::empty(200),
            ("GET", ["events"]) => self.events(req),

            (_, ["containers", id, "json"]) => self.inspect_container(id),
            ("POST", ["containers", id, "exec"]) => self.create_exec(id, req),
            ("POST", ["containers", id, "attach"]) => self.attach(id),
            ("POST", ["containers", id, "start"]) => self.start_container(id),
            ("POST", ["containers", id, "kill"]) => self.kill_container(id),
            ("POST", ["containers", _, "resize"]) => EmulatedResponse::empty(200),
            ("POST", ["containers", _, "build"]) => EmulatedResponse::empty(200),
            (m, ["containers", _, "archive"]) => archive(m),
            ("DELETE", ["containers", id]) => self.delete_container(id),

            ("POST", ["exec", id, "start"]) => self.start_exec(id),
            ("POST", ["exec", _, "resize"]) => EmulatedResponse::empty(200),
            (_, ["exec", id, "json"]) => self.inspect_exec(id),

            // The real daemon's image inspect is left unimplemented on purpose.
            (_, ["images", _, "json"]) => EmulatedResponse::empty(404),

            (_, []) => EmulatedResponse::message(200, "page not found"),
            _ => {
                debug!(method, path = %req.path, "unrouted request");
                EmulatedResponse::message(404, "page not found")
            }
        }
    }

    fn version(&self, api_version: Option<&str>) -> EmulatedResponse {
        if let Some(raw) = api_version
            && let Ok(version) = raw.parse::<f64>()
            && version < 1.12
        {
            return EmulatedResponse::text(
                200,
                format!(
                    "client version {version} is too old. Minimum supported API version is 1.12, \
                     please upgrade your client to a newer version"
                ),
            );
        }
        EmulatedResponse::json(200, self.store.identity().version_doc())
    }

    fn info(&self) -> EmulatedResponse {
        let system_time = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let doc = self
            .store
            .identity()
            .info_doc(&self.store.counts(), &system_time);
        EmulatedResponse::json(200, doc)
    }

    fn create_container(&self, req: &CapturedRequest) -> EmulatedResponse {
        let body: CreateContainerBody = req
            .body_json
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();

        let spec = ContainerSpec {
            image: body.image.unwrap_or_default(),
            cmd: body.cmd.as_ref().map(CmdField::joined).unwrap_or_default(),
            entrypoint: body
                .entrypoint
                .as_ref()
                .map(CmdField::joined)
                .unwrap_or_default(),
            env: body.env.unwrap_or_default(),
            name: req.arg("name").map(str::to_owned),
        };

        match self.store.create_container(spec) {
            Ok(container) => {
                metrics::counter!(m::SENSOR_CONTAINERS_CREATED_TOTAL).increment(1);
                EmulatedResponse::json(
                    201,
                    json!({ "Id": container.id, "Warnings": [] }),
                )
            }
            Err(err) => EmulatedResponse::from_error(&err),
        }
    }

    fn pull_image(&self, req: &CapturedRequest) -> EmulatedResponse {
        let image = req.arg("fromImage").unwrap_or("").to_owned();
        let tag = req.arg("tag").unwrap_or("latest").to_owned();

        // The image row is committed before streaming begins, so a client
        // disconnect mid-stream leaves the store consistent.
        let record = self.store.create_image(&image, &tag);
        metrics::counter!(m::SENSOR_IMAGES_PULLED_TOTAL).increment(1);

        let digest = format!("sha256:{}", record.id);
        let frames = pull_frames(&image, &tag, &digest);

        let (tx, rx) = mpsc::channel(16);
        let delay = self.config.pull_delay();
        tokio::spawn(async move {
            for (idx, frame) in frames.into_iter().enumerate() {
                // Static scanners time the gap between the two Downloading
                // frames; an instant pull is a detection signal.
                if idx == 3 && !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if tx.send(Bytes::from(frame)).await.is_err() {
                    // Client hung up; nothing left to do.
                    return;
                }
            }
        });

        EmulatedResponse::stream(200, rx)
    }

    fn inspect_container(&self, reference: &str) -> EmulatedResponse {
        let found = self
            .store
            .find_container_by_id_prefix(reference)
            .or_else(|| self.store.find_container_by_name(reference));
        match found {
            Some(container) => EmulatedResponse::json(200, container_inspect_doc(&container)),
            None => EmulatedResponse::message(404, format!("No such container: {reference}")),
        }
    }

    fn list_containers(&self) -> EmulatedResponse {
        let rows: Vec<Value> = self
            .store
            .list_containers()
            .iter()
            .map(container_summary_doc)
            .collect();
        EmulatedResponse::json(200, Value::Array(rows))
    }

    fn list_images(&self) -> EmulatedResponse {
        let rows: Vec<Value> = self
            .store
            .list_images()
            .iter()
            .map(|image| {
                json!({
                    "Containers": image.containers,
                    "Created": image.created,
                    "Id": format!("sha256:{}", image.id),
                    "Labels": {},
                    "ParentId": image.parent_id,
                    "RepoDigests": image.repo_digests,
                    "RepoTags": image.repo_tags,
                    "SharedSize": image.shared_size,
                    "Size": image.size,
                    "VirtualSize": image.virtual_size,
                })
            })
            .collect();
        EmulatedResponse::json(200, Value::Array(rows))
    }

    fn create_exec(&self, container_ref: &str, req: &CapturedRequest) -> EmulatedResponse {
        let body: CreateExecBody = req
            .body_json
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        let cmd = body.cmd.as_ref().map(CmdField::joined).unwrap_or_default();

        match self.store.create_exec(container_ref, &cmd) {
            Ok(exec) => {
                metrics::counter!(m::SENSOR_EXECS_CREATED_TOTAL).increment(1);
                EmulatedResponse::json(201, json!({ "Id": exec.id }))
            }
            Err(err) => EmulatedResponse::from_error(&err),
        }
    }

    fn start_exec(&self, reference: &str) -> EmulatedResponse {
        match self.store.start_exec(reference) {
            Ok(exec) => shell_reply(&exec.cmd),
            Err(err) => EmulatedResponse::from_error(&err),
        }
    }

    fn inspect_exec(&self, reference: &str) -> EmulatedResponse {
        match self.store.find_exec_by_id_prefix(reference) {
            Some(exec) => EmulatedResponse::json(200, exec_inspect_doc(&exec)),
            None => EmulatedResponse::message(404, format!("No such exec: {reference}")),
        }
    }

    fn attach(&self, reference: &str) -> EmulatedResponse {
        match self.store.find_container_by_id_prefix(reference) {
            Some(container) => shell_reply(&container.cmd),
            None => EmulatedResponse::empty(404),
        }
    }

    fn start_container(&self, reference: &str) -> EmulatedResponse {
        // Start always reports success, like the original surface; an
        // unknown id is only interesting to the classifier.
        let _ = self.store.start_container(reference);
        EmulatedResponse::empty(204)
    }

    fn kill_container(&self, reference: &str) -> EmulatedResponse {
        match self.store.kill_and_remove(reference) {
            Ok(_) => EmulatedResponse::empty(200),
            Err(err) => EmulatedResponse::from_error(&err),
        }
    }

    fn delete_container(&self, reference: &str) -> EmulatedResponse {
        match self.store.delete_container(reference) {
            Ok(_) => EmulatedResponse::empty(200),
            Err(err) => EmulatedResponse::from_error(&err),
        }
    }

    fn events(&self, req: &CapturedRequest) -> EmulatedResponse {
        // filters={"container":{"<id>":true},"type":{"container":true}}
        let filters: Option<Value> = req
            .arg("filters")
            .and_then(|raw| serde_json::from_str(raw).ok());
        let container_id = filters
            .as_ref()
            .and_then(|f| f.get("container"))
            .and_then(Value::as_object)
            .and_then(|o| o.keys().next().cloned());

        let Some(id) = container_id else {
            // Malformed noise must not produce a server error.
            return EmulatedResponse::empty(200);
        };

        let (image_name, container_name) = match self.store.find_container_by_id_prefix(&id) {
            Some(container) => (
                container.image_name,
                container.name.trim_start_matches('/').to_owned(),
            ),
            None => ("alpine".to_owned(), "unknown".to_owned()),
        };

        let frames: Vec<String> = lifecycle_events(&id, &image_name, &container_name)
            .into_iter()
            .map(|event| event.to_string())
            .collect();

        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            for frame in frames {
                if tx.send(Bytes::from(frame)).await.is_err() {
                    return;
                }
            }
        });
        EmulatedResponse::stream(200, rx)
    }
}

/// HEAD probes a path; everything else uploads. Both are accepted blindly —
/// the security value is entirely in classification.
fn archive(method: &str) -> EmulatedResponse {
    if method == "HEAD" {
        EmulatedResponse::empty(404)
    } else {
        EmulatedResponse::empty(200)
    }
}

/// Attach/exec reply: privileged identity for `id`/`whoami`, else silence,
/// always with the upgrade handshake Docker clients expect.
fn shell_reply(cmd: &str) -> EmulatedResponse {
    let resp = if cmd == "id" || cmd == "whoami" {
        EmulatedResponse::text(200, SHELL_IDENTITY)
    } else {
        EmulatedResponse::text(200, "")
    };
    resp.with_header("Content-Type", RAW_STREAM_CONTENT_TYPE)
        .with_header("Connection", "Upgrade")
        .with_header("Upgrade", "tcp")
}

/// Strips an optional `/v<version>/` prefix.
///
/// Returns the version (if present) and the remaining path, so that
/// `/v1.41/containers/json` and `/containers/json` dispatch identically.
fn split_version_prefix(path: &str) -> (Option<&str>, &str) {
    if let Some(rest) = path.strip_prefix("/v") {
        let end = rest.find('/').unwrap_or(rest.len());
        let version = &rest[..end];
        if !version.is_empty()
            && version.chars().all(|c| c.is_ascii_digit() || c == '.')
        {
            let remainder = &rest[end..];
            return (
                Some(version),
                if remainder.is_empty() { "/" } else { remainder },
            );
        }
    }
    (None, path)
}

/// The pull progression, one JSON object per chunk.
fn pull_frames(image: &str, tag: &str, digest: &str) -> Vec<String> {
    vec![
        json!({"status": format!("Pulling from library/{image}"), "id": tag}).to_string(),
        json!({"status": "Pulling fs layer", "progressDetail": {}, "id": digest}).to_string(),
        json!({
            "status": "Downloading",
            "progressDetail": {"current": 29404, "total": 2811478},
            "progress": "[>                                                  ]  29.4kB/2.811MB",
            "id": digest
        })
        .to_string(),
        json!({
            "status": "Downloading",
            "progressDetail": {"current": 2094047, "total": 2811478},
            "progress": "[=====================================>             ]  2.094MB/2.811MB",
            "id": digest
        })
        .to_string(),
        json!({"status": "Verifying Checksum", "progressDetail": {}, "id": digest}).to_string(),
        json!({"status": "Download complete", "progressDetail": {}, "id": digest}).to_string(),
        json!({
            "status": "Extracting",
            "progressDetail": {"current": 32768, "total": 2811478},
            "progress": "[>                                                  ]  32.77kB/2.811MB",
            "id": digest
        })
        .to_string(),
        json!({"status": "Pull complete", "progressDetail": {}, "id": digest}).to_string(),
        json!({"status": format!("Digest: {digest}")}).to_string(),
        json!({"status": format!("Downloaded newer image for {image}:{tag}")}).to_string(),
    ]
}

/// The fixed container lifecycle sequence for `/events`.
fn lifecycle_events(id: &str, image: &str, name: &str) -> Vec<Value> {
    let now = Utc::now();
    let time = now.timestamp();
    let time_nano = now.timestamp_nanos_opt().unwrap_or(time * 1_000_000_000);
    vec![
        json!({
            "status": "create", "id": id, "from": image,
            "Type": "container", "Action": "create",
            "Actor": {"ID": id, "Attributes": {"image": image, "name": name}},
            "time": time, "timeNano": time_nano
        }),
        json!({
            "Type": "network", "Action": "connect",
            "Actor": {"ID": id, "Attributes": {"container": id, "name": "bridge", "type": "bridge"}},
            "scope": "local", "time": time, "timeNano": time_nano
        }),
        json!({
            "status": "start", "id": id, "from": image,
            "Type": "container", "Action": "start",
            "Actor": {"ID": id, "Attributes": {"image": image, "name": name}},
            "scope": "local", "time": time, "timeNano": time_nano
        }),
        json!({
            "status": "resize", "id": id, "from": image,
            "Type": "container", "Action": "resize",
            "Actor": {"ID": id, "Attributes": {"height": "30", "width": "120", "image": image, "name": name}},
            "scope": "local", "time": time, "timeNano": time_nano
        }),
        json!({
            "status": "die", "id": id, "from": image,
            "Type": "container", "Action": "die",
            "Actor": {"ID": id, "Attributes": {"exitCode": "0", "image": image, "name": name}},
            "scope": "local", "time": time, "timeNano": time_nano
        }),
    ]
}

fn bridge_network_doc(network: &ContainerNetwork) -> Value {
    json!({
        "IPAMConfig": null,
        "Links": null,
        "Aliases": null,
        "NetworkID": network.network_id,
        "EndpointID": network.endpoint_id,
        "Gateway": network.gateway,
        "IPAddress": network.ip_address,
        "IPPrefixLen": network.ip_prefix_len,
        "IPv6Gateway": "",
        "GlobalIPv6Address": "",
        "GlobalIPv6PrefixLen": 0,
        "MacAddress": network.mac_address,
        "DriverOpts": null
    })
}

fn container_summary_doc(container: &ContainerRecord) -> Value {
    let image_digest = container
        .image_id
        .split(':')
        .nth(1)
        .unwrap_or(&container.image_id);
    json!({
        "Id": container.id,
        "Names": [container.name],
        "Image": container.image_name,
        "ImageID": image_digest,
        "Command": container.cmd,
        "Created": container.created_at.timestamp(),
        "Ports": [],
        "Labels": {},
        "State": container.state.as_str(),
        "Status": "Up About a minute",
        "HostConfig": {"NetworkMode": "default"},
        "NetworkSettings": {"Networks": {"bridge": bridge_network_doc(&container.network)}},
        "Mounts": []
    })
}

fn container_inspect_doc(container: &ContainerRecord) -> Value {
    let started_at = container
        .started_at
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Micros, true))
        .unwrap_or_else(|| "0001-01-01T00:00:00Z".to_owned());
    let entrypoint = if container.entrypoint.is_empty() {
        Value::Null
    } else {
        Value::String(container.entrypoint.clone())
    };
    json!({
        "Id": container.id,
        "Created": container.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        "Path": container.cmd,
        "Args": [],
        "State": {
            "Status": container.state.as_str(),
            "Running": container.state == crate::store::ContainerState::Running,
            "Paused": false,
            "Restarting": false,
            "OOMKilled": false,
            "Dead": false,
            "Pid": 0,
            "ExitCode": 0,
            "Error": "",
            "StartedAt": started_at,
            "FinishedAt": "0001-01-01T00:00:00Z"
        },
        "Image": container.image_id,
        "ResolvConfPath": container.resolv_conf_path,
        "HostnamePath": container.hostname_path,
        "HostsPath": container.hosts_path,
        "LogPath": container.log_path,
        "Name": container.name,
        "RestartCount": 0,
        "Driver": "overlay2",
        "Platform": "linux",
        "MountLabel": "",
        "ProcessLabel": "",
        "AppArmorProfile": "docker-default",
        "ExecIDs": null,
        "HostConfig": {"NetworkMode": "default"},
        "GraphDriver": {"Data": null, "Name": "overlay2"},
        "Mounts": [],
        "Config": {
            "Hostname": container.hostname,
            "Domainname": "",
            "User": "",
            "AttachStdin": false,
            "AttachStdout": true,
            "AttachStderr": true,
            "Tty": false,
            "OpenStdin": false,
            "StdinOnce": false,
            "Env": container.env,
            "Cmd": container.cmd,
            "Image": container.image_name,
            "Volumes": null,
            "WorkingDir": "",
            "Entrypoint": entrypoint,
            "OnBuild": null,
            "Labels": {}
        },
        "NetworkSettings": {
            "Bridge": "",
            "SandboxID": "",
            "HairpinMode": false,
            "LinkLocalIPv6Address": "",
            "LinkLocalIPv6PrefixLen": 0,
            "Ports": {},
            "SandboxKey": "",
            "SecondaryIPAddresses": null,
            "SecondaryIPv6Addresses": null,
            "Networks": {"bridge": bridge_network_doc(&container.network)}
        }
    })
}

fn exec_inspect_doc(exec: &ExecRecord) -> Value {
    json!({
        "ID": exec.id,
        "Running": exec.running,
        "ExitCode": exec.exit_code,
        "ProcessConfig": {
            "tty": exec.process_config.tty,
            "entrypoint": exec.process_config.entrypoint,
            "arguments": exec.process_config.arguments,
            "privileged": exec.process_config.privileged
        },
        "OpenStdin": exec.open_stdin,
        "OpenStderr": exec.open_stderr,
        "OpenStdout": exec.open_stdout,
        "CanRemove": exec.can_remove,
        "ContainerID": exec.container_id,
        "DetachKeys": exec.detach_keys,
        "Pid": exec.pid
    })
}
