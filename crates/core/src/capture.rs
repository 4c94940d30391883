//! 요청 캡처 로그 — append-only 저장과 change feed 추상화
//!
//! [`RequestLog`]는 에뮬레이터가 기록하고 분석기가 소비하는 저장소 경계입니다.
//! 코어는 저장 기술에 의존하지 않으며 이 trait 시그니처만 사용합니다.
//! [`MemoryRequestLog`]는 단일 프로세스 배포용 기본 구현으로,
//! append 순서가 곧 구독자 전달 순서입니다 (센서별 순서 보장).
//!
//! # 재접속 체크포인트
//!
//! broadcast 구독자가 뒤처져 이벤트를 놓친 경우, 마지막으로 처리한 `seq`를
//! 체크포인트로 [`RequestLog::find_from_seq`]를 호출해 유실 없이 따라잡을 수
//! 있습니다. 레코드는 불변이므로 중복 처리는 멱등합니다.

use std::sync::RwLock;
use std::time::SystemTime;

use tokio::sync::broadcast;

use crate::error::StorageError;
use crate::types::CapturedRequest;

/// 기본 broadcast 채널 용량
const DEFAULT_FEED_CAPACITY: usize = 1024;

/// 요청 캡처 로그 trait
///
/// 구현체는 append 시점에 단조 증가 `seq`를 부여하고,
/// 같은 센서의 레코드를 append 순서대로 전달해야 합니다.
pub trait RequestLog: Send + Sync + 'static {
    /// 요청을 추가하고 부여된 순번을 반환합니다.
    fn append(&self, request: CapturedRequest) -> Result<u64, StorageError>;

    /// 시간 구간 `[start, end)`에 캡처된 요청을 반환합니다.
    fn find_range(
        &self,
        start: SystemTime,
        end: SystemTime,
    ) -> Result<Vec<CapturedRequest>, StorageError>;

    /// `seq` 이후(미포함)의 모든 요청을 순서대로 반환합니다.
    ///
    /// 구독자가 lag으로 이벤트를 놓쳤을 때 체크포인트 재동기화에 사용합니다.
    fn find_from_seq(&self, seq: u64) -> Result<Vec<CapturedRequest>, StorageError>;

    /// 마지막으로 부여된 순번을 반환합니다 (레코드가 없으면 0).
    fn latest_seq(&self) -> u64;

    /// 신규 요청 change feed를 구독합니다.
    fn subscribe(&self) -> broadcast::Receiver<CapturedRequest>;
}

/// 인메모리 캡처 로그
///
/// append-only `Vec`과 `tokio::sync::broadcast` 팬아웃으로 구성됩니다.
/// 쓰기 락 구간 안에서 순번 부여와 저장이 함께 일어나므로
/// 순번은 누락 없이 단조 증가합니다.
pub struct MemoryRequestLog {
    inner: RwLock<Vec<CapturedRequest>>,
    feed: broadcast::Sender<CapturedRequest>,
}

impl MemoryRequestLog {
    /// 기본 채널 용량으로 로그를 생성합니다.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_FEED_CAPACITY)
    }

    /// 지정한 broadcast 용량으로 로그를 생성합니다.
    pub fn with_capacity(capacity: usize) -> Self {
        let (feed, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: RwLock::new(Vec::new()),
            feed,
        }
    }

    /// 저장된 레코드 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// 레코드가 없는지 여부를 반환합니다.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // 락 poisoning은 패닉한 writer가 남긴 것이므로 데이터 자체는 append-only로
    // 안전합니다. 복구해서 계속 사용합니다.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<CapturedRequest>> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<CapturedRequest>> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for MemoryRequestLog {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestLog for MemoryRequestLog {
    fn append(&self, mut request: CapturedRequest) -> Result<u64, StorageError> {
        let seq = {
            let mut records = self.write();
            let seq = records.last().map(|r| r.seq).unwrap_or(0) + 1;
            request.seq = seq;
            records.push(request.clone());
            seq
        };
        // 구독자가 없으면 send가 실패하지만, 로그 자체는 이미 기록되었습니다.
        let _ = self.feed.send(request);
        Ok(seq)
    }

    fn find_range(
        &self,
        start: SystemTime,
        end: SystemTime,
    ) -> Result<Vec<CapturedRequest>, StorageError> {
        Ok(self
            .read()
            .iter()
            .filter(|r| r.timestamp >= start && r.timestamp < end)
            .cloned()
            .collect())
    }

    fn find_from_seq(&self, seq: u64) -> Result<Vec<CapturedRequest>, StorageError> {
        Ok(self
            .read()
            .iter()
            .filter(|r| r.seq > seq)
            .cloned()
            .collect())
    }

    fn latest_seq(&self) -> u64 {
        self.read().last().map(|r| r.seq).unwrap_or(0)
    }

    fn subscribe(&self) -> broadcast::Receiver<CapturedRequest> {
        self.feed.subscribe()
    }
}
