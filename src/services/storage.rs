//! # 업로드 문서 저장 서비스
//!
//! 자기소개서/포트폴리오 PDF를 저장하고, 나중에 다시 찾을 수 있는 위치(locator)를 돌려줍니다.
//!
//! 이 모듈의 구성:
//! - `ObjectStorage`: 저장소 추상화 트레이트 (S3 같은 외부 저장소로 교체 가능)
//! - `LocalObjectStorage`: 로컬 디렉토리에 파일을 쓰는 기본 구현
//! - `document_key()`: 세션 ID와 원본 파일명으로 저장 키 생성

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

use crate::error::AppError;

/// 문서 저장소: 바이트를 받아 저장하고 위치 문자열을 반환합니다.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String, AppError>;
}

/// 로컬 파일시스템 저장소
///
/// `root` 디렉토리 아래에 키 이름 그대로 저장하고,
/// `{public_url}/{key}` 형태의 위치를 반환합니다.
#[derive(Debug, Clone)]
pub struct LocalObjectStorage {
    root: PathBuf,
    public_url: String,
}

impl LocalObjectStorage {
    pub fn new(root: impl Into<PathBuf>, public_url: &str) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn put(&self, key: &str, bytes: &[u8], _content_type: &str) -> Result<String, AppError> {
        // `..`나 절대 경로가 섞인 키는 root 밖을 가리킬 수 있음
        let relative = Path::new(key);
        if key.is_empty() || !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(AppError::BadRequest(format!("Invalid storage key: {}", key)));
        }

        let full_path = self.root.join(relative);

        // 부모 디렉토리가 없으면 생성 (이미 있으면 무시)
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(&full_path, bytes).await?;
        tracing::debug!(key, size = bytes.len(), "Stored document");

        Ok(format!("{}/{}", self.public_url, key))
    }
}

/// 업로드 문서의 저장 키를 만듭니다.
///
/// # 예시
/// ```text
/// document_key("s-1", "coverLetter", "My Cover Letter.pdf") → "s-1-coverLetter-my-cover-letter.pdf"
/// document_key("s-1", "portfolio", "???.pdf")          → "s-1-portfolio-document.pdf"
/// ```
pub fn document_key(session_id: &str, kind: &str, filename: &str) -> String {
    let stem = filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(filename);

    let slug = slug::slugify(stem);
    let slug = if slug.is_empty() { "document".to_string() } else { slug };

    format!("{}-{}-{}.pdf", session_id, kind, slug)
}
