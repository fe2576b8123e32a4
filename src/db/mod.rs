//! # 데이터베이스 접근 계층 (Data Access Layer)
//!
//! 면접 세션과 스텝을 저장하는 스텝 저장소(Step Store)입니다.
//! 상태 머신은 메모리에 스텝 상태를 캐시하지 않고, 매 작업마다 여기서 다시 읽습니다.
//!
//! 각 하위 모듈:
//! - `interviews`: 세션 생성/조회와 조건부 상태 전이
//! - `steps`: 스텝 일괄 생성, 답변/평가 기록

pub mod interviews;
pub mod steps;

pub use interviews::*;
pub use steps::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// SQLite 연결 풀을 만듭니다. 파일이 없으면 새로 생성합니다.
pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
}

/// `./migrations`의 SQL 파일들을 아직 실행되지 않은 것만 순서대로 실행합니다.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
