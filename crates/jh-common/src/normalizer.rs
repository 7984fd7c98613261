use std::collections::BTreeMap;

use crate::fingerprint;
use crate::location::normalize_location;
use crate::normalize::{clean_text, company_identity, comparison_form};
use crate::salary::parse_salary;
use crate::{CanonicalJob, RawListing};

#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// 説明文の最大文字数。超過分は切り詰める。
    pub description_max_chars: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            description_max_chars: 8000,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("listing from {source} has no usable {field}")]
    UnparseableListing { source: String, field: &'static str },
}

/// RawListing → CanonicalJob の正規化
///
/// タイトルと会社名は同一性判定に必須で、trim 後に空ならレコードごと失敗する。
/// 給与・勤務地はベストエフォート: 解釈できなくても正規化は成功し、
/// 該当フィールドが欠損扱いになるだけ。
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn normalize(&self, raw: &RawListing) -> Result<CanonicalJob, NormalizeError> {
        let title = clean_text(&raw.title);
        if title.is_empty() {
            return Err(NormalizeError::UnparseableListing {
                source: raw.source.clone(),
                field: "title",
            });
        }

        let company = clean_text(&raw.company);
        if company.is_empty() {
            return Err(NormalizeError::UnparseableListing {
                source: raw.source.clone(),
                field: "company",
            });
        }

        let location_text = raw
            .location_text
            .as_deref()
            .map(clean_text)
            .filter(|s| !s.is_empty());
        let location_token = location_text.as_deref().and_then(normalize_location);

        let salary_text = raw
            .salary_text
            .as_deref()
            .map(clean_text)
            .filter(|s| !s.is_empty());
        let salary = salary_text.as_deref().and_then(parse_salary);

        let description = raw
            .description
            .as_deref()
            .map(clean_text)
            .filter(|s| !s.is_empty())
            .map(|s| cap_chars(&s, self.config.description_max_chars));

        let fingerprint = fingerprint::compute(
            &comparison_form(&title),
            &company_identity(&company),
            location_token.as_deref(),
        );

        let mut sources = BTreeMap::new();
        let url = raw.url.trim();
        if !url.is_empty() {
            sources.insert(raw.source.clone(), url.to_string());
        }

        Ok(CanonicalJob {
            title,
            company,
            location_text,
            location_token,
            salary,
            salary_text,
            description,
            sources,
            first_seen: None,
            last_seen: None,
            fingerprint,
        })
    }
}

fn cap_chars(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    input.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::salary::CURRENCY_JPY;
    use crate::SalaryRange;

    fn base_listing() -> RawListing {
        RawListing {
            source: "doda".into(),
            url: "https://doda.example/jobs/1".into(),
            title: "UXデザイナー".into(),
            company: "Acme".into(),
            location_text: Some("東京都渋谷区".into()),
            salary_text: Some("400万〜600万円".into()),
            description: Some("自社プロダクトのUX改善を担当します。".into()),
            ..RawListing::default()
        }
    }

    #[test]
    fn normalizes_full_listing() {
        let normalizer = Normalizer::default();
        let job = normalizer.normalize(&base_listing()).unwrap();

        assert_eq!(job.title, "UXデザイナー");
        assert_eq!(job.company, "Acme");
        assert_eq!(job.location_token.as_deref(), Some("東京"));
        assert_eq!(
            job.salary,
            Some(SalaryRange {
                min: 4_000_000,
                max: 6_000_000,
                currency: CURRENCY_JPY.to_string(),
            })
        );
        assert_eq!(job.fingerprint, "08115537355df7ca");
        assert_eq!(
            job.sources.get("doda").map(String::as_str),
            Some("https://doda.example/jobs/1")
        );
        assert!(job.first_seen.is_none());
    }

    #[test]
    fn empty_title_or_company_is_unparseable() {
        let normalizer = Normalizer::default();

        let mut no_title = base_listing();
        no_title.title = "   ".into();
        assert!(matches!(
            normalizer.normalize(&no_title),
            Err(NormalizeError::UnparseableListing { field: "title", .. })
        ));

        let mut no_company = base_listing();
        no_company.company = "".into();
        assert!(matches!(
            normalizer.normalize(&no_company),
            Err(NormalizeError::UnparseableListing { field: "company", .. })
        ));
    }

    #[test]
    fn unparseable_salary_does_not_fail_the_record() {
        let normalizer = Normalizer::default();
        let mut listing = base_listing();
        listing.salary_text = Some("応相談".into());

        let job = normalizer.normalize(&listing).unwrap();
        assert_eq!(job.salary, None);
        assert_eq!(job.salary_text.as_deref(), Some("応相談"));
    }

    #[test]
    fn unmatched_location_is_preserved_without_token() {
        let normalizer = Normalizer::default();
        let mut listing = base_listing();
        listing.location_text = Some("ベルリン".into());

        let job = normalizer.normalize(&listing).unwrap();
        assert_eq!(job.location_text.as_deref(), Some("ベルリン"));
        assert_eq!(job.location_token, None);
    }

    #[test]
    fn fingerprint_is_independent_of_volatile_fields() {
        let normalizer = Normalizer::default();
        let a = normalizer.normalize(&base_listing()).unwrap();

        let mut other = base_listing();
        other.description = Some("全く別の長い説明文。".into());
        other.salary_text = Some("年収800万円".into());
        other.url = "https://green.example/jobs/9".into();
        other.source = "green".into();
        let b = normalizer.normalize(&other).unwrap();

        assert_eq!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn width_and_corporate_variants_collapse_to_one_fingerprint() {
        let normalizer = Normalizer::default();
        let a = normalizer.normalize(&base_listing()).unwrap();

        let mut variant = base_listing();
        variant.title = "ＵＸデザイナー".into();
        variant.company = "株式会社Acme".into();
        let b = normalizer.normalize(&variant).unwrap();

        assert_eq!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn long_descriptions_are_capped() {
        let normalizer = Normalizer::new(NormalizerConfig {
            description_max_chars: 10,
        });
        let mut listing = base_listing();
        listing.description = Some("あ".repeat(50));

        let job = normalizer.normalize(&listing).unwrap();
        assert_eq!(job.description_len(), 10);
    }
}
