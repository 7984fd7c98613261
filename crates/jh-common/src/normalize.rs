use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static RE_BRACKETS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[【】\[\]（）\(\)「」『』〔〕《》]").unwrap());

static RE_CORPORATE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:株式会社|有限会社|合同会社|合資会社)\s*").unwrap());

static RE_CORPORATE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*(?:株式会社|有限会社|合同会社|合資会社)$").unwrap());

/// 表示用テキストの正規化
///
/// 1. NFKC で全角/半角を統一する（ＵＸ → UX、ﾃﾞｻﾞｲﾅｰ → デザイナー）
/// 2. 制御文字を除去する
/// 3. 連続する空白を 1 つに畳み、前後を trim する
///
/// 大文字小文字は保持する。比較用の形は [`comparison_form`] を使う。
pub fn clean_text(input: &str) -> String {
    let unified: String = input.nfkc().filter(|c| !c.is_control()).collect();
    RE_WHITESPACE.replace_all(&unified, " ").trim().to_string()
}

/// 比較・指紋計算用の正規化形（小文字、装飾括弧除去）
pub fn comparison_form(input: &str) -> String {
    let cleaned = clean_text(input).to_lowercase();
    let stripped = RE_BRACKETS.replace_all(&cleaned, "");
    RE_WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

/// 会社名の同一性判定用の形
///
/// 「株式会社Acme」「Acme株式会社」が同じ会社に潰れるよう、
/// 先頭・末尾の法人格表記を落とした上で [`comparison_form`] を適用する。
pub fn company_identity(input: &str) -> String {
    let cleaned = clean_text(input);
    let without_prefix = RE_CORPORATE_PREFIX.replace(&cleaned, "");
    let without_suffix = RE_CORPORATE_SUFFIX.replace(&without_prefix, "");
    comparison_form(&without_suffix)
}
