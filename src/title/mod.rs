use crate::configuration::Context;
use crate::llm::llm_providers::Gemini;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const TITLE_SYSTEM_PROMPT: &str = "あなたは日本語でイベントの魅力的で簡潔なタイトルを作るアシスタントです。\
以下の指示に厳密に従ってください。\
1) 使ってよい情報は入力の what / where / tags / capacity / fee / description のみ。\
入力にない事実・評価・誇張（例: 大人気, 本格, プロ級 など）は付け足さない。\
意味が等価な範囲の言い換えのみ可（例: 持込可→持込自由）。\
2) タイトルには必ず what と where を含める。\
3) 強調要素は入力から最大2つ（tags / capacity / fee / description から抽出）。\
4) 日時（年月日・曜日・時刻）はタイトルに含めない（日時は別の場所で使う）。\
5) 禁止: 『未定』『お問い合わせ』『TBD』『coming soon』『〇〇／○○／◯◯』等の曖昧語、絵文字や過度な記号、煽り表現。\
6) トーンは具体的・端的。長さはおよそ12〜28文字を目安に自然な日本語。\
7) 区切り記号は必要に応じて「｜」「・」「×」「＠」を使用してよい（使い過ぎない）。\
8) 出力は JSON のみで {\"title\":\"...\"} を返す。前後に追加テキストは一切不要。";

// filler terms that disqualify a generated title
const BANNED_TERMS: &[&str] = &[
    "未定",
    "お問い合わせ",
    "お問合わせ",
    "tbd",
    "coming soon",
    "〇〇",
    "○○",
    "◯◯",
];

const MIN_TITLE_CHARS: usize = 8;
const MAX_TITLE_CHARS: usize = 32;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TitleRequest {
    #[serde(default)]
    pub what: Option<String>,
    #[serde(default, rename = "where")]
    pub place: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub capacity: Option<String>,
    #[serde(default)]
    pub fee: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct TitleResponse {
    pub title: String,
    pub source: TitleSource,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TitleSource {
    Llm,
    Base,
}

fn normalize(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Deterministic fallback composed from the structured fields alone.
fn base_title(request: &TitleRequest) -> String {
    let what = request.what.as_deref().unwrap_or("");
    let head = match request.place.as_deref().filter(|place| !place.is_empty()) {
        Some(place) => format!("{place}で{what}").trim().to_string(),
        None => what.to_string(),
    };

    let mut extras: Vec<String> = Vec::new();
    if !request.tags.is_empty() {
        extras.push(
            request
                .tags
                .iter()
                .take(2)
                .map(|tag| format!("#{tag}"))
                .collect::<Vec<_>>()
                .join("・"),
        );
    }
    if let Some(capacity) = request.capacity.as_deref().filter(|c| !c.is_empty()) {
        extras.push(capacity.to_string());
    }
    if let Some(fee) = request.fee.as_deref().filter(|f| !f.is_empty()) {
        let fee = if fee == "0円" { "無料" } else { fee };
        extras.push(fee.to_string());
    }

    if extras.is_empty() {
        head
    } else {
        format!("{head}｜{}", extras.join("・"))
    }
}

fn is_valid(title: &str, what: &str, place: &str) -> bool {
    let title = normalize(title);
    if title.is_empty() || what.is_empty() || place.is_empty() {
        return false;
    }
    let lower = title.to_lowercase();
    if BANNED_TERMS.iter().any(|term| lower.contains(term)) {
        return false;
    }
    // allow the place without its prefecture/city suffix characters
    let place_stripped: String = place
        .chars()
        .filter(|c| !"都道府県市区町村".contains(*c))
        .collect();
    if !(title.contains(what) && (title.contains(place) || title.contains(&place_stripped))) {
        return false;
    }
    let len = title.chars().count();
    (MIN_TITLE_CHARS..=MAX_TITLE_CHARS).contains(&len)
}

fn build_title_prompt(request: &TitleRequest) -> String {
    let tags = request
        .tags
        .iter()
        .take(2)
        .cloned()
        .collect::<Vec<_>>()
        .join("・");
    format!(
        "{TITLE_SYSTEM_PROMPT}\n\nwhat: {}\nwhere: {}\ntags: {}\ncapacity: {}\nfee: {}\ndescription: {}",
        request.what.as_deref().unwrap_or(""),
        request.place.as_deref().unwrap_or(""),
        tags,
        request.capacity.as_deref().unwrap_or(""),
        request.fee.as_deref().unwrap_or(""),
        request.description.as_deref().unwrap_or(""),
    )
}

/// Title generation prefers the LLM but always has the base title to fall
/// back on, so this service never surfaces an upstream failure.
pub struct TitleService {
    gemini: Option<Gemini>,
}

impl TitleService {
    pub fn new(context: &Context) -> Self {
        let gemini = context
            .config
            .gemini_api_key
            .as_ref()
            .map(|key| Gemini::new(key, &context.config.gemini_model));
        Self { gemini }
    }

    pub fn from_provider(gemini: Option<Gemini>) -> Self {
        Self { gemini }
    }

    pub async fn generate(&self, request: &TitleRequest) -> TitleResponse {
        let what = normalize(request.what.as_deref().unwrap_or(""));
        let place = normalize(request.place.as_deref().unwrap_or(""));

        let mut request = request.clone();
        request.what = Some(what.clone()).filter(|s| !s.is_empty());
        request.place = Some(place.clone()).filter(|s| !s.is_empty());

        if what.is_empty() || place.is_empty() {
            return TitleResponse {
                title: base_title(&request),
                source: TitleSource::Base,
            };
        }

        if let Some(candidate) = self.generate_candidate(&request).await {
            if is_valid(&candidate, &what, &place) {
                return TitleResponse {
                    title: normalize(&candidate),
                    source: TitleSource::Llm,
                };
            }
            info!(%candidate, "generated title rejected, using base title");
        }
        TitleResponse {
            title: base_title(&request),
            source: TitleSource::Base,
        }
    }

    async fn generate_candidate(&self, request: &TitleRequest) -> Option<String> {
        let gemini = self.gemini.as_ref()?;
        let content = match gemini.generate(&build_title_prompt(request)).await {
            Ok(content) => content,
            Err(e) => {
                warn!("title generation failed: {e}");
                return None;
            }
        };
        match serde_json::from_str::<serde_json::Value>(&content) {
            Ok(value) => value["title"]
                .as_str()
                .map(|title| title.trim().to_string())
                .filter(|title| !title.is_empty()),
            Err(e) => {
                warn!("non-JSON title content: {e}");
                None
            }
        }
    }
}
