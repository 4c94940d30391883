//! 리소스 템플릿 — 불변 기본값과 레코드 빌더
//!
//! 호출자가 주지 않은 필드는 여기 정의된 불변 기본값 구조체에서 채워집니다.
//! 공유 가변 전역은 없습니다 — 빌더 함수가 매 호출마다 새 레코드를 만듭니다.
//!
//! 파생 경로(`/var/lib/docker/containers/<id>/...`)와 네트워크 설정은
//! 실제 데몬의 레이아웃을 그대로 따릅니다. Docker 클라이언트가 생성 직후
//! inspect로 이 필드들을 검사하기 때문입니다.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::names::token_hex;
use crate::store::{
    ContainerNetwork, ContainerRecord, ContainerState, ExecRecord, ImageRecord, ProcessConfig,
};

/// 에뮬레이션되는 데몬의 아이덴티티
///
/// `/version`과 `/info`가 직렬화하는 원천 데이터입니다.
/// 시드 후 불변이며, `SystemTime`만 매 호출마다 새로 계산됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorIdentity {
    /// 데몬 ID (`XXXX:XXXX:...` 형식)
    pub id: String,
    /// 플랫폼 이름
    pub platform_name: String,
    /// 데몬 버전
    pub version: String,
    /// API 버전
    pub api_version: String,
    /// 지원하는 최소 API 버전
    pub min_api_version: String,
    /// git 커밋
    pub git_commit: String,
    /// go 버전
    pub go_version: String,
    /// OS 식별자 ("linux")
    pub os: String,
    /// 아키텍처
    pub arch: String,
    /// 커널 버전
    pub kernel_version: String,
    /// 빌드 시각
    pub build_time: String,
    /// 운영체제 표시명
    pub operating_system: String,
    /// OS 타입
    pub os_type: String,
    /// 데몬 호스트명
    pub name: String,
    /// CPU 수
    pub ncpu: u32,
    /// 메모리 총량 (바이트)
    pub mem_total: u64,
    /// 스토리지 드라이버
    pub driver: String,
    /// cgroup 드라이버
    pub cgroup_driver: String,
    /// cgroup 버전
    pub cgroup_version: String,
    /// 로깅 드라이버
    pub logging_driver: String,
    /// 기본 런타임
    pub default_runtime: String,
    /// init 바이너리
    pub init_binary: String,
    /// containerd 커밋
    pub containerd_commit: String,
    /// runc 커밋
    pub runc_commit: String,
    /// init 커밋
    pub init_commit: String,
    /// 보안 옵션
    pub security_options: Vec<String>,
    /// 데이터 루트 디렉토리
    pub docker_root_dir: String,
    /// 레지스트리 주소
    pub index_server_address: String,
}

impl Default for SensorIdentity {
    fn default() -> Self {
        Self {
            id: "4V6S:5YOX:JIBM:TFZG:2VUE:BU7N:JB4B:GCG2:Q3EH:XMGP:B5DN:KS2B".to_owned(),
            platform_name: "Docker Engine - Community".to_owned(),
            version: "20.10.14".to_owned(),
            api_version: "1.41".to_owned(),
            min_api_version: "1.12".to_owned(),
            git_commit: "87a90dc".to_owned(),
            go_version: "go1.16.15".to_owned(),
            os: "linux".to_owned(),
            arch: "amd64".to_owned(),
            kernel_version: "5.4.0-107-generic".to_owned(),
            build_time: "2022-03-23T19:25:43.000000000+00:00".to_owned(),
            operating_system: "Ubuntu 20.04.4 LTS".to_owned(),
            os_type: "linux".to_owned(),
            name: "docker-node-01".to_owned(),
            ncpu: 2,
            mem_total: 4_124_512_256,
            driver: "overlay2".to_owned(),
            cgroup_driver: "cgroupfs".to_owned(),
            cgroup_version: "1".to_owned(),
            logging_driver: "json-file".to_owned(),
            default_runtime: "runc".to_owned(),
            init_binary: "docker-init".to_owned(),
            containerd_commit: "3df54a852345ae127d1fa3092b95168e4a88e2f8".to_owned(),
            runc_commit: "v1.0.3-0-gf46b6ba".to_owned(),
            init_commit: "de40ad0".to_owned(),
            security_options: vec![
                "name=apparmor".to_owned(),
                "name=seccomp,profile=default".to_owned(),
            ],
            docker_root_dir: "/var/lib/docker".to_owned(),
            index_server_address: "https://index.docker.io/v1/".to_owned(),
        }
    }
}

impl SensorIdentity {
    /// `/version` 응답 본문을 만듭니다.
    pub fn version_doc(&self) -> Value {
        json!({
            "Platform": { "Name": self.platform_name },
            "Components": [
                {
                    "Name": "Engine",
                    "Version": self.version,
                    "Details": {
                        "ApiVersion": self.api_version,
                        "Arch": self.arch,
                        "BuildTime": self.build_time,
                        "Experimental": "false",
                        "GitCommit": self.git_commit,
                        "GoVersion": self.go_version,
                        "KernelVersion": self.kernel_version,
                        "MinAPIVersion": self.min_api_version,
                        "Os": self.os,
                    }
                },
                {
                    "Name": "containerd",
                    "Version": "1.5.11",
                    "Details": { "GitCommit": self.containerd_commit }
                },
                {
                    "Name": "runc",
                    "Version": "1.0.3",
                    "Details": { "GitCommit": self.runc_commit }
                },
                {
                    "Name": "docker-init",
                    "Version": "0.19.0",
                    "Details": { "GitCommit": self.init_commit }
                }
            ],
            "Version": self.version,
            "ApiVersion": self.api_version,
            "MinAPIVersion": self.min_api_version,
            "GitCommit": self.git_commit,
            "GoVersion": self.go_version,
            "Os": self.os,
            "Arch": self.arch,
            "KernelVersion": self.kernel_version,
            "BuildTime": self.build_time,
        })
    }

    /// `/info` 응답 본문을 만듭니다. `system_time`은 매 호출마다 새로 계산해
    /// 넘겨야 합니다.
    pub fn info_doc(&self, counts: &ResourceCounts, system_time: &str) -> Value {
        // /info는 uname 형식(x86_64), /version은 go 형식(amd64)을 씁니다.
        let architecture = if self.arch == "amd64" {
            "x86_64".to_owned()
        } else {
            self.arch.clone()
        };
        json!({
            "ID": self.id,
            "Containers": counts.containers,
            "ContainersRunning": counts.containers_running,
            "ContainersPaused": counts.containers_paused,
            "ContainersStopped": counts.containers_stopped,
            "Images": counts.images,
            "Driver": self.driver,
            "DriverStatus": [
                ["Backing Filesystem", "extfs"],
                ["Supports d_type", "true"],
                ["Native Overlay Diff", "true"],
                ["userxattr", "false"]
            ],
            "Plugins": {
                "Volume": ["local"],
                "Network": ["bridge", "host", "ipvlan", "macvlan", "null", "overlay"],
                "Authorization": null,
                "Log": ["awslogs", "fluentd", "gcplogs", "gelf", "journald", "json-file", "local", "logentries", "splunk", "syslog"]
            },
            "MemoryLimit": true,
            "SwapLimit": false,
            "KernelMemory": true,
            "KernelMemoryTCP": true,
            "CpuCfsPeriod": true,
            "CpuCfsQuota": true,
            "CPUShares": true,
            "CPUSet": true,
            "PidsLimit": true,
            "IPv4Forwarding": true,
            "BridgeNfIptables": true,
            "BridgeNfIp6tables": true,
            "Debug": false,
            "NFd": 29,
            "OomKillDisable": true,
            "NGoroutines": 43,
            "SystemTime": system_time,
            "LoggingDriver": self.logging_driver,
            "CgroupDriver": self.cgroup_driver,
            "CgroupVersion": self.cgroup_version,
            "NEventsListener": 0,
            "KernelVersion": self.kernel_version,
            "OperatingSystem": self.operating_system,
            "OSVersion": "20.04",
            "OSType": self.os_type,
            "Architecture": architecture,
            "IndexServerAddress": self.index_server_address,
            "RegistryConfig": {
                "AllowNondistributableArtifactsCIDRs": [],
                "AllowNondistributableArtifactsHostnames": [],
                "InsecureRegistryCIDRs": ["127.0.0.0/8"],
                "IndexConfigs": {
                    "docker.io": {
                        "Name": "docker.io",
                        "Mirrors": [],
                        "Secure": true,
                        "Official": true
                    }
                },
                "Mirrors": []
            },
            "NCPU": self.ncpu,
            "MemTotal": self.mem_total,
            "GenericResources": null,
            "DockerRootDir": self.docker_root_dir,
            "HttpProxy": "",
            "HttpsProxy": "",
            "NoProxy": "",
            "Name": self.name,
            "Labels": [],
            "ExperimentalBuild": false,
            "ServerVersion": self.version,
            "Runtimes": {
                "io.containerd.runc.v2": { "path": "runc" },
                "io.containerd.runtime.v1.linux": { "path": "runc" },
                "runc": { "path": "runc" }
            },
            "DefaultRuntime": self.default_runtime,
            "Swarm": {
                "NodeID": "",
                "NodeAddr": "",
                "LocalNodeState": "inactive",
                "ControlAvailable": false,
                "Error": "",
                "RemoteManagers": null
            },
            "LiveRestoreEnabled": false,
            "Isolation": "",
            "InitBinary": self.init_binary,
            "ContainerdCommit": {
                "ID": self.containerd_commit,
                "Expected": self.containerd_commit
            },
            "RuncCommit": {
                "ID": self.runc_commit,
                "Expected": self.runc_commit
            },
            "InitCommit": {
                "ID": self.init_commit,
                "Expected": self.init_commit
            },
            "SecurityOptions": self.security_options,
            "Warnings": null
        })
    }
}

/// `/info` 카운트 필드
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceCounts {
    /// 전체 컨테이너 수
    pub containers: i64,
    /// 실행 중 컨테이너 수
    pub containers_running: i64,
    /// 일시정지 컨테이너 수
    pub containers_paused: i64,
    /// 정지된 컨테이너 수
    pub containers_stopped: i64,
    /// 이미지 수
    pub images: i64,
}

/// 이미지 기본값 (불변)
#[derive(Debug, Clone)]
pub struct ImageDefaults {
    /// 이미지 크기 (alpine 급)
    pub size: i64,
    /// 가상 크기
    pub virtual_size: i64,
    /// 공유 크기 (-1 = 미계산)
    pub shared_size: i64,
    /// 사용 컨테이너 수 (-1 = 미계산)
    pub containers: i64,
}

impl Default for ImageDefaults {
    fn default() -> Self {
        Self {
            size: 5_860_000,
            virtual_size: 5_860_000,
            shared_size: -1,
            containers: -1,
        }
    }
}

/// 컨테이너 기본값 (불변)
#[derive(Debug, Clone)]
pub struct ContainerDefaults {
    /// 초기 상태
    pub state: ContainerState,
    /// 브리지 게이트웨이
    pub gateway: String,
    /// 컨테이너 IP
    pub ip_address: String,
    /// 프리픽스 길이
    pub ip_prefix_len: u8,
    /// MAC 주소
    pub mac_address: String,
}

impl Default for ContainerDefaults {
    fn default() -> Self {
        Self {
            state: ContainerState::Created,
            gateway: "172.17.0.1".to_owned(),
            ip_address: "172.17.0.2".to_owned(),
            ip_prefix_len: 16,
            mac_address: "02:42:ac:11:00:02".to_owned(),
        }
    }
}

/// 컨테이너 빌더 입력 — 템플릿 기본값 위에 덮어쓰는 필드들
#[derive(Debug, Clone)]
pub struct ContainerOverrides {
    /// 소유 센서 ID
    pub sensor_id: String,
    /// 컨테이너 ID (호출자가 유일성을 보장)
    pub id: String,
    /// `/이름` 형식 (호출자가 유일성을 보장)
    pub name: String,
    /// 이미지 이름
    pub image_name: String,
    /// 공백으로 합친 명령
    pub cmd: String,
    /// 공백으로 합친 엔트리포인트
    pub entrypoint: String,
    /// 환경 변수
    pub env: Vec<String>,
}

/// 이미지 레코드를 템플릿 기본값으로 합성합니다.
pub fn new_image_from_template(
    sensor_id: &str,
    id: &str,
    from_image: &str,
    tag: &str,
) -> ImageRecord {
    let defaults = ImageDefaults::default();
    ImageRecord {
        id: id.to_owned(),
        repo_tags: vec![format!("{from_image}:{tag}")],
        repo_digests: vec![format!("{from_image}@sha256:{}", token_hex(32))],
        created: Utc::now().timestamp(),
        size: defaults.size,
        virtual_size: defaults.virtual_size,
        shared_size: defaults.shared_size,
        containers: defaults.containers,
        parent_id: String::new(),
        sensor_id: sensor_id.to_owned(),
    }
}

/// 컨테이너 레코드를 템플릿 기본값으로 합성합니다.
///
/// 파생 경로와 네트워크 ID, hostname은 매 호출마다 새로 만들어집니다.
pub fn new_container_from_template(overrides: ContainerOverrides) -> ContainerRecord {
    let defaults = ContainerDefaults::default();
    let id = overrides.id;
    ContainerRecord {
        image_id: format!("sha256:{id}"),
        resolv_conf_path: format!("/var/lib/docker/containers/{id}/resolv.conf"),
        hostname_path: format!("/var/lib/docker/containers/{id}/hostname"),
        hosts_path: format!("/var/lib/docker/containers/{id}/hosts"),
        log_path: format!("/var/lib/docker/containers/{id}/{id}-json.log"),
        hostname: token_hex(6),
        network: ContainerNetwork {
            network_id: token_hex(32),
            endpoint_id: token_hex(32),
            gateway: defaults.gateway,
            ip_address: defaults.ip_address,
            ip_prefix_len: defaults.ip_prefix_len,
            mac_address: defaults.mac_address,
        },
        state: defaults.state,
        created_at: Utc::now(),
        started_at: None,
        id,
        name: overrides.name,
        image_name: overrides.image_name,
        cmd: overrides.cmd,
        entrypoint: overrides.entrypoint,
        env: overrides.env,
        sensor_id: overrides.sensor_id,
    }
}

/// exec 레코드를 템플릿 기본값으로 합성합니다.
pub fn new_exec_from_template(
    sensor_id: &str,
    id: &str,
    container_id: &str,
    cmd: &str,
) -> ExecRecord {
    ExecRecord {
        id: id.to_owned(),
        container_id: container_id.to_owned(),
        cmd: cmd.to_owned(),
        running: false,
        exit_code: 0,
        process_config: ProcessConfig {
            tty: true,
            entrypoint: cmd.to_owned(),
            arguments: Vec::new(),
            privileged: false,
        },
        open_stdin: false,
        open_stderr: false,
        open_stdout: false,
        can_remove: false,
        detach_keys: String::new(),
        pid: 1637,
        sensor_id: sensor_id.to_owned(),
    }
}
