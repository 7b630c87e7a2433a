// src/summarize.rs
//! Per-ticker digest generation.
//!
//! Three paths, in priority order: empty evidence returns a fixed sentinel
//! with no call made; a missing API key selects a deterministic mock digest
//! so the whole pipeline runs offline; otherwise one structured completion
//! request goes out. Transport failures propagate to the caller (the
//! orchestrator skips just that ticker), while an unparseable response
//! degrades to a raw-narrative digest instead of failing.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Settings;

/// System instruction for the completion call. Korean sell-side synthesis;
/// weak evidence must be flagged as speculative, no buy/sell directives.
const SYSTEM_PROMPT: &str = "너는 주식 리서치 애널리스트다.
입력은 '같은 날짜(as-of)의 여러 리포트에서 특정 종목에 대해 언급된 스니펫 묶음'이다.
아래 형식으로 한국어로 간결하게 요약하라.

요구:
- 사실/수치/이벤트를 우선.
- 서로 다른 리포트가 '동일 주장'인지 '상충'인지 구분.
- 과도한 확신 금지. 근거가 약하면 '추정'이라고 명시.
- 투자 조언/매수·매도 지시는 하지 말고, 관찰/리스크/체크포인트로 마무리.

출력(JSON):
{
  \"summary\": \"3~6문장 요약\",
  \"bullets\": [\"핵심1\", \"핵심2\", \"리스크/체크포인트\"],
  \"confidence\": 0~100 (근거의 일관성과 구체성 기반)
}
";

fn default_confidence() -> i32 {
    50
}

/// Structured summarization output. Doubles as the wire shape the model is
/// asked to produce, so missing fields fall back instead of failing a parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Digest {
    pub summary: String,
    #[serde(default)]
    pub bullets: Vec<String>,
    #[serde(default = "default_confidence")]
    pub confidence: i32,
}

/// Seam for the completion backend; lets tests count or script calls.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// One completion request; returns the raw assistant content.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
    fn name(&self) -> &'static str;
}

/// OpenAI-compatible chat-completions provider.
pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(40))
            .build()
            .context("building completion http client")?;
        Ok(Self {
            http,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            response_format: serde_json::Value,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.2,
            response_format: serde_json::json!({ "type": "json_object" }),
        };

        let resp = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("sending completion request")?;
        let status = resp.status();
        if !status.is_success() {
            bail!("completion endpoint returned HTTP {status}");
        }
        let body: Resp = resp.json().await.context("decoding completion response")?;
        let content = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        Ok(content)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Digest engine over an optional provider; `None` selects the mock path.
pub struct SummaryEngine {
    provider: Option<Box<dyn CompletionProvider>>,
}

impl SummaryEngine {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let provider = match &settings.openai_api_key {
            Some(key) => Some(Box::new(OpenAiProvider::new(
                key.clone(),
                settings.openai_model.clone(),
            )?) as Box<dyn CompletionProvider>),
            None => None,
        };
        Ok(Self { provider })
    }

    /// No credential: every summarize call takes the deterministic mock path.
    pub fn offline() -> Self {
        Self { provider: None }
    }

    pub fn with_provider(provider: Box<dyn CompletionProvider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    /// Summarize an ordered snippet batch (caller caps it at the 40 most
    /// recent lines). Errors mean the transport failed; a malformed model
    /// response is not an error.
    pub async fn summarize(&self, snippets: &[String]) -> Result<Digest> {
        if snippets.is_empty() {
            return Ok(Digest {
                summary: "언급 없음".to_string(),
                bullets: Vec::new(),
                confidence: 0,
            });
        }

        let Some(provider) = &self.provider else {
            return Ok(mock_digest(snippets));
        };

        let user = snippets
            .iter()
            .map(|s| format!("- {s}"))
            .collect::<Vec<_>>()
            .join("\n\n");
        let content = provider.complete(SYSTEM_PROMPT, &user).await?;

        match serde_json::from_str::<Digest>(&content) {
            Ok(mut digest) => {
                digest.confidence = digest.confidence.clamp(0, 100);
                Ok(digest)
            }
            Err(_) => {
                tracing::info!(
                    provider = provider.name(),
                    "model returned non-JSON content, keeping it as the narrative"
                );
                Ok(Digest {
                    summary: content,
                    bullets: Vec::new(),
                    confidence: 40,
                })
            }
        }
    }
}

/// Deterministic offline digest built from the first 4 snippets, each
/// truncated to 120 characters. Byte-for-byte reproducible for equal input.
fn mock_digest(snippets: &[String]) -> Digest {
    let joined = snippets
        .iter()
        .take(4)
        .map(|s| s.chars().take(120).collect::<String>())
        .collect::<Vec<_>>()
        .join(" / ");
    Digest {
        summary: format!("(모의요약) 스니펫 기반 요약: {joined}"),
        bullets: vec![
            "(모의) 리포트에서 종목 관련 이벤트/모멘텀 언급".to_string(),
            "(모의) 수급/환율/실적/정책 변수 체크".to_string(),
            "(모의) 다음 실적/지표 발표에 따른 변동성 가능".to_string(),
        ],
        confidence: 35,
    }
}
