//! # 음성 서비스
//!
//! 질문을 전달할 때 함께 보내는 부가 데이터 두 가지를 만듭니다.
//! - 질문 본문을 읽어주는 MP3 음성 (Google Cloud Text-to-Speech)
//! - 클라이언트가 답변을 받아쓸 때 쓰는 임시 STT 토큰 (OpenAI Realtime)
//!
//! 둘 다 실패해도 면접은 진행됩니다. 호출하는 쪽은 실패를 로그로 남기고 `null`을 보냅니다.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

const TTS_URL: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";
const STT_TOKEN_URL: &str = "https://api.openai.com/v1/realtime/client_secrets";

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("Speech request failed: {0}")]
    Request(String),

    #[error("Speech provider returned an empty response")]
    Empty,
}

impl From<reqwest::Error> for SpeechError {
    fn from(e: reqwest::Error) -> Self {
        SpeechError::Request(e.to_string())
    }
}

#[async_trait]
pub trait SpeechService: Send + Sync {
    /// 텍스트를 MP3로 합성하고 Base64 문자열로 돌려줍니다.
    async fn synthesize(&self, text: &str) -> Result<String, SpeechError>;

    /// 음성 인식용 임시 토큰을 발급합니다.
    async fn issue_stt_token(&self) -> Result<String, SpeechError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    #[serde(default)]
    audio_content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClientSecret {
    #[serde(default)]
    value: Option<String>,
}

pub struct HttpSpeechService {
    http_client: reqwest::Client,
    tts_api_key: Option<String>,
    openai_api_key: Option<String>,
}

impl HttpSpeechService {
    pub fn new(
        tts_api_key: Option<String>,
        openai_api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, SpeechError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            tts_api_key,
            openai_api_key,
        })
    }
}

#[async_trait]
impl SpeechService for HttpSpeechService {
    async fn synthesize(&self, text: &str) -> Result<String, SpeechError> {
        let key = self
            .tts_api_key
            .as_deref()
            .ok_or(SpeechError::NotConfigured("TTS_API_KEY"))?;

        let body = json!({
            "input": { "text": text },
            "voice": { "languageCode": "ko-KR", "name": "ko-KR-Standard-C" },
            "audioConfig": { "audioEncoding": "MP3", "speakingRate": 1.0, "pitch": 0 }
        });

        tracing::debug!(chars = text.chars().count(), "Requesting TTS");

        let response: SynthesizeResponse = self
            .http_client
            .post(TTS_URL)
            .query(&[("key", key)])
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // audioContent는 이미 Base64로 인코딩되어 있습니다
        response
            .audio_content
            .filter(|audio| !audio.is_empty())
            .ok_or(SpeechError::Empty)
    }

    async fn issue_stt_token(&self) -> Result<String, SpeechError> {
        let key = self
            .openai_api_key
            .as_deref()
            .ok_or(SpeechError::NotConfigured("OPENAI_API_KEY"))?;

        let body = json!({
            "session": {
                "type": "transcription",
                "audio": {
                    "input": {
                        "transcription": { "model": "gpt-4o-transcribe", "language": "ko" },
                        "turn_detection": { "type": "semantic_vad" }
                    }
                }
            }
        });

        let secret: ClientSecret = self
            .http_client
            .post(STT_TOKEN_URL)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        secret.value.ok_or(SpeechError::Empty)
    }
}
