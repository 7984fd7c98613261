use sha2::{Digest, Sha256};

use crate::normalize::{company_identity, comparison_form};

/// 指紋スキームのバージョンタグ。ハッシュ入力に埋め込むことで、
/// スキーム変更時に旧指紋と衝突しない。
pub const SCHEME_VERSION: &str = "v2";

/// フィールド区切り（US, unit separator）。求人テキストに現れない制御文字を使う。
const FIELD_DELIMITER: char = '\u{1f}';

/// 正規化済みフィールドから重複排除用の指紋を生成する（SHA-256 先頭16文字）
///
/// 入力は（比較形タイトル・会社同一性形・勤務地トークン）のみ。
/// 説明文・給与・タイムスタンプの揺れでは指紋は変わらない。
pub fn compute(title: &str, company: &str, location_token: Option<&str>) -> String {
    let input = [
        SCHEME_VERSION,
        title,
        company,
        location_token.unwrap_or(""),
    ]
    .join(&FIELD_DELIMITER.to_string());

    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let bytes = hasher.finalize();
    let mut hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    hex.truncate(16);
    hex
}

/// 生のタイトル・会社名・勤務地トークンに正規化を適用してから指紋を生成する
pub fn compute_raw(title: &str, company: &str, location_token: Option<&str>) -> String {
    compute(
        &comparison_form(title),
        &company_identity(company),
        location_token,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_matches_expected_prefix() {
        assert_eq!(
            compute("uxデザイナー", "acme", Some("東京")),
            "08115537355df7ca"
        );
        assert_eq!(compute("uxデザイナー", "acme", None), "c64f30a5b6da042b");
    }

    #[test]
    fn fingerprint_ignores_case_and_width_variants() {
        let a = compute_raw("UXデザイナー", "株式会社Acme", Some("東京"));
        let b = compute_raw("ＵＸデザイナー", "Acme株式会社", Some("東京"));
        assert_eq!(a, b);
        assert_eq!(a, "08115537355df7ca");
    }

    #[test]
    fn fingerprint_changes_with_identity_fields() {
        let base = compute("uxデザイナー", "acme", Some("東京"));
        assert_ne!(base, compute("rustエンジニア", "acme", Some("東京")));
        assert_ne!(base, compute("uxデザイナー", "beta", Some("東京")));
        assert_ne!(base, compute("uxデザイナー", "acme", Some("大阪")));
        assert_ne!(base, compute("uxデザイナー", "acme", None));
    }

    #[test]
    fn missing_location_is_stable() {
        assert_eq!(
            compute("uxデザイナー", "acme", None),
            compute("uxデザイナー", "acme", None)
        );
    }
}
