//! URL-safe slug derivation with kind-scoped uniqueness.
//!
//! Normalization pipeline: fold diacritics to ASCII, lowercase, collapse
//! whitespace and punctuation to single hyphens, trim edge hyphens, cap
//! the length. The entity's numeric-id suffix makes collisions unlikely;
//! when one still occurs, a timestamp suffix is tried a bounded number of
//! times before falling back to a random token, so generation always
//! terminates.

use lazy_static::lazy_static;
use regex::Regex;
use uuid::Uuid;

use crate::config::SlugConfig;
use crate::error::Result;
use crate::models::ContentKind;
use crate::store::ContentStore;

lazy_static! {
    static ref NON_SLUG: Regex = Regex::new(r"[^a-z0-9-]+").expect("valid regex");
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("valid regex");
    static ref MULTI_HYPHEN: Regex = Regex::new(r"-{2,}").expect("valid regex");
}

/// Derives unique, URL-safe identifiers from free text
#[derive(Debug, Clone)]
pub struct SlugGenerator {
    config: SlugConfig,
}

impl SlugGenerator {
    pub fn new(config: SlugConfig) -> Self {
        Self { config }
    }

    /// Normalize free text to a base slug. Empty input (or input that
    /// normalizes to nothing) yields a random token.
    pub fn base_slug(&self, text: &str) -> String {
        let folded: String = text.chars().map(fold_diacritic).collect();
        let lowered = folded.to_lowercase();
        let hyphenated = WHITESPACE.replace_all(&lowered, "-");
        let cleaned = NON_SLUG.replace_all(&hyphenated, "-");
        let collapsed = MULTI_HYPHEN.replace_all(&cleaned, "-");
        let trimmed = collapsed.trim_matches('-');

        if trimmed.is_empty() {
            return random_token();
        }

        let mut slug = trimmed.to_string();
        if slug.len() > self.config.max_length {
            slug.truncate(self.config.max_length);
            slug = slug.trim_end_matches('-').to_string();
        }
        slug
    }

    /// Base slug with the entity's short-id uniqueness suffix,
    /// e.g. "my-awesome-post-1a2b3c4d"
    pub fn slug_with_id(&self, text: &str, id: &Uuid) -> String {
        format!("{}-{}", self.base_slug(text), short_id(id))
    }

    /// Produce a slug unique within the kind, consulting the store for
    /// collisions. Retries with a timestamp suffix up to the configured
    /// attempt count, then falls back to a random token.
    pub async fn unique_slug(
        &self,
        store: &dyn ContentStore,
        kind: ContentKind,
        text: &str,
        id: &Uuid,
    ) -> Result<String> {
        let candidate = self.slug_with_id(text, id);
        if !store.slug_exists(kind, &candidate).await? {
            return Ok(candidate);
        }

        for attempt in 0..self.config.max_attempts {
            let suffixed = format!("{}-{}", candidate, chrono::Utc::now().timestamp_millis());
            if !store.slug_exists(kind, &suffixed).await? {
                return Ok(suffixed);
            }
            tracing::debug!(
                slug = %suffixed,
                attempt = attempt + 1,
                "Slug collision, retrying"
            );
        }

        // Collision retries exhausted; a random token guarantees termination
        let fallback = format!("{}-{}", self.base_slug(text), random_token());
        tracing::warn!(slug = %fallback, "Slug collision retries exhausted, using random token");
        Ok(fallback)
    }
}

impl Default for SlugGenerator {
    fn default() -> Self {
        Self::new(SlugConfig::default())
    }
}

fn short_id(id: &Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

fn random_token() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

/// Map common Latin diacritics to their ASCII base letter; everything
/// else passes through untouched and is handled by the regex cleanup.
fn fold_diacritic(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ă' | 'ạ' | 'ả' | 'ấ' | 'ầ' | 'ẩ' | 'ẫ' | 'ậ'
        | 'ắ' | 'ằ' | 'ẳ' | 'ẵ' | 'ặ' => 'a',
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' | 'Ă' => 'A',
        'è' | 'é' | 'ê' | 'ë' | 'ẹ' | 'ẻ' | 'ẽ' | 'ế' | 'ề' | 'ể' | 'ễ' | 'ệ' => 'e',
        'È' | 'É' | 'Ê' | 'Ë' => 'E',
        'ì' | 'í' | 'î' | 'ï' | 'ỉ' | 'ị' | 'ĩ' => 'i',
        'Ì' | 'Í' | 'Î' | 'Ï' => 'I',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ơ' | 'ọ' | 'ỏ' | 'ố' | 'ồ' | 'ổ' | 'ỗ' | 'ộ' | 'ớ'
        | 'ờ' | 'ở' | 'ỡ' | 'ợ' => 'o',
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ơ' => 'O',
        'ù' | 'ú' | 'û' | 'ü' | 'ư' | 'ụ' | 'ủ' | 'ũ' | 'ứ' | 'ừ' | 'ử' | 'ữ' | 'ự' => 'u',
        'Ù' | 'Ú' | 'Û' | 'Ü' | 'Ư' => 'U',
        'ý' | 'ỳ' | 'ỷ' | 'ỹ' | 'ỵ' => 'y',
        'ñ' => 'n',
        'Ñ' => 'N',
        'ç' => 'c',
        'Ç' => 'C',
        'đ' => 'd',
        'Đ' => 'D',
        other => other,
    }
}
