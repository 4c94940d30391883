//! 리소스 저장소 — 에뮬레이션된 Docker 리소스의 단일 진실 공급원
//!
//! [`ResourceStore`]는 센서 하나가 소유한 이미지/컨테이너/exec 세션의
//! 생명주기를 관리합니다. 모든 뮤테이터는 쓰기 락 구간 안에서
//! 유일성 검사와 삽입을 함께 수행하므로, 동시 생성 간 ID 충돌이
//! 발생하지 않습니다. 목록 조회는 삽입 순서를 보존합니다.
//!
//! 모든 레코드는 저장소의 센서 ID로 스탬프되며, 교차 센서 읽기/쓰기는
//! 이 타입의 API로는 표현할 수 없습니다.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EmulationError;
use crate::names::{random_container_name, token_hex};
use crate::template::{self, SensorIdentity};

/// 컨테이너 상태
///
/// 실제 프로세스는 없습니다 — 상태 전이는 순전히 논리적입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    /// 생성됨, 아직 시작하지 않음
    Created,
    /// 시작됨 (논리적)
    Running,
    /// 종료됨
    Exited,
}

impl ContainerState {
    /// Docker API가 쓰는 소문자 상태 문자열을 반환합니다.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Exited => "exited",
        }
    }
}

/// 에뮬레이션된 이미지 레코드
///
/// 이미지 풀 액션으로만 생성되며 이후 변경되지 않습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    /// 콘텐츠 주소 형식의 64자 hex 다이제스트 (`sha256:` 접두어 제외)
    pub id: String,
    /// `name:tag` 형식의 태그 목록 — 컨테이너 생성의 조회 키
    pub repo_tags: Vec<String>,
    /// `name@sha256:<hex>` 형식의 다이제스트 목록
    pub repo_digests: Vec<String>,
    /// 생성 시각 (unix 초)
    pub created: i64,
    /// 이미지 크기 (바이트)
    pub size: i64,
    /// 가상 크기 (바이트)
    pub virtual_size: i64,
    /// 공유 크기 (-1 = 미계산, 실제 데몬과 동일)
    pub shared_size: i64,
    /// 이 이미지를 쓰는 컨테이너 수 (-1 = 미계산)
    pub containers: i64,
    /// 부모 이미지 ID
    pub parent_id: String,
    /// 소유 센서 ID
    pub sensor_id: String,
}

/// 컨테이너 브리지 네트워크 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerNetwork {
    /// 네트워크 ID (64자 hex)
    pub network_id: String,
    /// 엔드포인트 ID (64자 hex)
    pub endpoint_id: String,
    /// 게이트웨이 주소
    pub gateway: String,
    /// 컨테이너 IP
    pub ip_address: String,
    /// 프리픽스 길이
    pub ip_prefix_len: u8,
    /// MAC 주소
    pub mac_address: String,
}

/// 에뮬레이션된 컨테이너 레코드
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerRecord {
    /// 64자 hex 토큰 — 접두어 조회 지원
    pub id: String,
    /// `/이름` 형식, 센서 내 유일
    pub name: String,
    /// `sha256:` 접두어가 붙은 이미지 참조
    pub image_id: String,
    /// 요청에 적힌 이미지 이름 (예: "alpine")
    pub image_name: String,
    /// 공백으로 합친 명령
    pub cmd: String,
    /// 공백으로 합친 엔트리포인트
    pub entrypoint: String,
    /// 환경 변수
    pub env: Vec<String>,
    /// 논리적 상태
    pub state: ContainerState,
    /// 생성 시각
    pub created_at: DateTime<Utc>,
    /// 시작 시각 (시작 전이면 None)
    pub started_at: Option<DateTime<Utc>>,
    /// 무작위 hostname (실제 데몬은 짧은 ID 형태를 씁니다)
    pub hostname: String,
    /// 파생 경로 — 실 데몬의 /var/lib/docker 레이아웃을 흉내냅니다
    pub resolv_conf_path: String,
    /// hostname 파일 경로
    pub hostname_path: String,
    /// hosts 파일 경로
    pub hosts_path: String,
    /// json 로그 경로
    pub log_path: String,
    /// 브리지 네트워크 설정
    pub network: ContainerNetwork,
    /// 소유 센서 ID
    pub sensor_id: String,
}

/// exec 세션의 프로세스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// TTY 할당 여부
    pub tty: bool,
    /// 실행 명령 (공백으로 합침)
    pub entrypoint: String,
    /// 추가 인자
    pub arguments: Vec<String>,
    /// 특권 여부
    pub privileged: bool,
}

/// 에뮬레이션된 exec 세션 레코드
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecRecord {
    /// 64자 hex 토큰 — 접두어 조회 지원
    pub id: String,
    /// 대상 컨테이너 ID (요청에 적힌 참조 그대로)
    pub container_id: String,
    /// 공백으로 합친 명령
    pub cmd: String,
    /// 실행 중 여부 — exec-start 전후로 true→false로 뒤집힙니다
    pub running: bool,
    /// 종료 코드
    pub exit_code: i64,
    /// 프로세스 설정
    pub process_config: ProcessConfig,
    /// stdin 열림 여부
    pub open_stdin: bool,
    /// stderr 열림 여부
    pub open_stderr: bool,
    /// stdout 열림 여부
    pub open_stdout: bool,
    /// 제거 가능 여부
    pub can_remove: bool,
    /// detach 키 시퀀스
    pub detach_keys: String,
    /// 가짜 PID
    pub pid: u32,
    /// 소유 센서 ID
    pub sensor_id: String,
}

/// 컨테이너 생성 입력
///
/// 공격자 JSON에서 파싱된 필드만 담습니다. 나머지는 템플릿이 채웁니다.
#[derive(Debug, Clone, Default)]
pub struct ContainerSpec {
    /// 이미지 이름 (태그 제외)
    pub image: String,
    /// 공백으로 합친 명령
    pub cmd: String,
    /// 공백으로 합친 엔트리포인트
    pub entrypoint: String,
    /// 환경 변수
    pub env: Vec<String>,
    /// 이름 지정 (없으면 자동 생성)
    pub name: Option<String>,
}

struct StoreInner {
    identity: SensorIdentity,
    images: Vec<ImageRecord>,
    containers: Vec<ContainerRecord>,
    execs: Vec<ExecRecord>,
}

/// 리소스 저장소
///
/// `Clone`은 같은 내부 상태를 공유하는 핸들을 만듭니다.
#[derive(Clone)]
pub struct ResourceStore {
    sensor_id: String,
    inner: Arc<RwLock<StoreInner>>,
}

impl ResourceStore {
    /// 빈 저장소를 생성하고 기본 데몬 아이덴티티를 설치합니다.
    pub fn new(sensor_id: impl Into<String>) -> Self {
        let sensor_id = sensor_id.into();
        Self {
            sensor_id,
            inner: Arc::new(RwLock::new(StoreInner {
                identity: SensorIdentity::default(),
                images: Vec::new(),
                containers: Vec::new(),
                execs: Vec::new(),
            })),
        }
    }

    /// 저장소의 센서 ID를 반환합니다.
    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    // 락 poisoning은 패닉한 writer가 남긴 것입니다. 레코드 뮤테이션은 단일
    // push/remove라 부분 기록이 없으므로 복구해서 계속 사용합니다.
    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// 데몬 아이덴티티를 교체합니다 (시드 시점에 호출).
    pub fn set_identity(&self, identity: SensorIdentity) {
        self.write().identity = identity;
    }

    /// 데몬 아이덴티티를 반환합니다.
    pub fn identity(&self) -> SensorIdentity {
        self.read().identity.clone()
    }

    /// 기본 이미지와 컨테이너를 시드합니다.
    ///
    /// 빈 데몬은 그 자체로 탐지 신호라서, 배포 직후에도
    /// 그럴듯한 목록이 보이도록 합니다.
    pub fn seed_defaults(&self) {
        let image = self.create_image("alpine", "latest");
        let _ = self.create_container(ContainerSpec {
            image: "alpine".to_owned(),
            cmd: "/bin/sh".to_owned(),
            ..Default::default()
        });
        tracing::debug!(
            sensor_id = %self.sensor_id,
            image_id = %image.id,
            "seeded default emulation resources"
        );
    }

    /// `name:tag` 태그로 이미지를 찾습니다.
    pub fn find_image_by_tag(&self, repo_tag: &str) -> Option<ImageRecord> {
        self.read()
            .images
            .iter()
            .find(|i| i.repo_tags.iter().any(|t| t == repo_tag))
            .cloned()
    }

    /// 이미지를 합성하여 저장합니다. 풀 요청은 항상 성공합니다.
    pub fn create_image(&self, from_image: &str, tag: &str) -> ImageRecord {
        let mut inner = self.write();
        let mut id = token_hex(32);
        // 64자 hex 충돌은 사실상 불가능하지만, 유일성 불변식은 락 안에서 지킵니다.
        while inner.images.iter().any(|i| i.id == id) {
            id = token_hex(32);
        }
        let record = template::new_image_from_template(&self.sensor_id, &id, from_image, tag);
        inner.images.push(record.clone());
        record
    }

    /// 삽입 순서대로 이미지를 나열합니다.
    pub fn list_images(&self) -> Vec<ImageRecord> {
        self.read().images.clone()
    }

    /// 컨테이너를 생성합니다.
    ///
    /// `<image>:latest` 태그의 이미지가 없으면 [`EmulationError::NoSuchImage`]를
    /// 반환합니다 — 에뮬레이션이 강제하는 유일한 실제 전제조건입니다.
    pub fn create_container(
        &self,
        spec: ContainerSpec,
    ) -> Result<ContainerRecord, EmulationError> {
        let mut inner = self.write();

        let repo_tag = format!("{}:latest", spec.image);
        if !inner
            .images
            .iter()
            .any(|i| i.repo_tags.iter().any(|t| t == &repo_tag))
        {
            return Err(EmulationError::NoSuchImage(format!("['{repo_tag}']")));
        }

        let name = match &spec.name {
            Some(name) => {
                let name = if name.starts_with('/') {
                    name.clone()
                } else {
                    format!("/{name}")
                };
                if inner.containers.iter().any(|c| c.name == name) {
                    return Err(EmulationError::NameConflict(name));
                }
                name
            }
            None => {
                let mut name = random_container_name();
                while inner.containers.iter().any(|c| c.name == name) {
                    name = random_container_name();
                }
                name
            }
        };

        let mut id = token_hex(32);
        while inner.containers.iter().any(|c| c.id == id) {
            id = token_hex(32);
        }

        let record = template::new_container_from_template(template::ContainerOverrides {
            sensor_id: self.sensor_id.clone(),
            id,
            name,
            image_name: spec.image,
            cmd: spec.cmd,
            entrypoint: spec.entrypoint,
            env: spec.env,
        });
        inner.containers.push(record.clone());
        Ok(record)
    }

    /// ID 접두어로 컨테이너를 찾습니다. 빈 접두어는 매칭하지 않습니다.
    pub fn find_container_by_id_prefix(&self, prefix: &str) -> Option<ContainerRecord> {
        if prefix.is_empty() {
            return None;
        }
        self.read()
            .containers
            .iter()
            .find(|c| c.id.starts_with(prefix))
            .cloned()
    }

    /// 이름으로 컨테이너를 찾습니다. 선행 `/`는 있어도 없어도 됩니다.
    pub fn find_container_by_name(&self, name: &str) -> Option<ContainerRecord> {
        let normalized = if name.starts_with('/') {
            name.to_owned()
        } else {
            format!("/{name}")
        };
        self.read()
            .containers
            .iter()
            .find(|c| c.name == normalized)
            .cloned()
    }

    /// 컨테이너를 논리적으로 시작합니다 (`Created` → `Running`).
    pub fn start_container(&self, id_prefix: &str) -> Result<(), EmulationError> {
        let mut inner = self.write();
        match inner
            .containers
            .iter_mut()
            .find(|c| !id_prefix.is_empty() && c.id.starts_with(id_prefix))
        {
            Some(container) => {
                container.state = ContainerState::Running;
                container.started_at = Some(Utc::now());
                Ok(())
            }
            None => Err(EmulationError::NoSuchContainer(id_prefix.to_owned())),
        }
    }

    /// 컨테이너를 kill하고 레코드를 제거합니다.
    pub fn kill_and_remove(&self, id_prefix: &str) -> Result<ContainerRecord, EmulationError> {
        self.remove_container(id_prefix)
    }

    /// 컨테이너 레코드를 삭제합니다.
    pub fn delete_container(&self, id_prefix: &str) -> Result<ContainerRecord, EmulationError> {
        self.remove_container(id_prefix)
    }

    fn remove_container(&self, id_prefix: &str) -> Result<ContainerRecord, EmulationError> {
        let mut inner = self.write();
        let pos = inner
            .containers
            .iter()
            .position(|c| !id_prefix.is_empty() && c.id.starts_with(id_prefix));
        match pos {
            Some(idx) => Ok(inner.containers.remove(idx)),
            None => Err(EmulationError::NoSuchContainer(id_prefix.to_owned())),
        }
    }

    /// 삽입 순서대로 컨테이너를 나열합니다.
    pub fn list_containers(&self) -> Vec<ContainerRecord> {
        self.read().containers.clone()
    }

    /// 컨테이너에 대한 exec 세션을 생성합니다.
    pub fn create_exec(
        &self,
        container_prefix: &str,
        cmd: &str,
    ) -> Result<ExecRecord, EmulationError> {
        let mut inner = self.write();
        if !inner
            .containers
            .iter()
            .any(|c| !container_prefix.is_empty() && c.id.starts_with(container_prefix))
        {
            return Err(EmulationError::NoSuchContainer(container_prefix.to_owned()));
        }

        let mut id = token_hex(32);
        while inner.execs.iter().any(|e| e.id == id) {
            id = token_hex(32);
        }
        let record =
            template::new_exec_from_template(&self.sensor_id, &id, container_prefix, cmd);
        inner.execs.push(record.clone());
        Ok(record)
    }

    /// exec 세션을 논리적으로 실행합니다.
    ///
    /// `running`은 start 전후로 true였다가 false로 끝나며,
    /// 저장되는 최종 상태는 종료(exit_code 0)입니다.
    pub fn start_exec(&self, id_prefix: &str) -> Result<ExecRecord, EmulationError> {
        let mut inner = self.write();
        match inner
            .execs
            .iter_mut()
            .find(|e| !id_prefix.is_empty() && e.id.starts_with(id_prefix))
        {
            Some(exec) => {
                exec.running = false;
                exec.exit_code = 0;
                Ok(exec.clone())
            }
            None => Err(EmulationError::NoSuchExec(id_prefix.to_owned())),
        }
    }

    /// ID 접두어로 exec 세션을 찾습니다.
    pub fn find_exec_by_id_prefix(&self, prefix: &str) -> Option<ExecRecord> {
        if prefix.is_empty() {
            return None;
        }
        self.read()
            .execs
            .iter()
            .find(|e| e.id.starts_with(prefix))
            .cloned()
    }

    /// 리소스 수 요약을 반환합니다 (`/info`의 카운트 필드).
    pub fn counts(&self) -> template::ResourceCounts {
        let inner = self.read();
        let running = inner
            .containers
            .iter()
            .filter(|c| c.state == ContainerState::Running)
            .count() as i64;
        let stopped = inner
            .containers
            .iter()
            .filter(|c| c.state == ContainerState::Exited)
            .count() as i64;
        template::ResourceCounts {
            containers: inner.containers.len() as i64,
            containers_running: running,
            containers_paused: 0,
            containers_stopped: stopped,
            images: inner.images.len() as i64,
        }
    }
}
