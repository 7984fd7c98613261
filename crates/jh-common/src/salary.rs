use once_cell::sync::Lazy;
use regex::Regex;

use crate::normalize::clean_text;
use crate::SalaryRange;

pub const CURRENCY_JPY: &str = "JPY";

/// 月給→年収換算の上限。これ以上の金額は「年収の例示」とみなし換算しない。
const MONTHLY_CONVERSION_CEILING: i64 = 2_500_000;

// 「400万〜600万円」「400~600万円」。単位は後半の「万」で確定する。
static RE_RANGE_MAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,3}(?:,\d{3})*|\d+)\s*(?:万円?)?\s*[〜~\-ー]\s*(\d{1,3}(?:,\d{3})*|\d+)\s*万円?")
        .unwrap()
});

// 「年収460万円」「予定年収>980万円」
static RE_ANNUAL_MAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:年収|予定年収)\s*[>＞]?\s*(\d{1,3}(?:,\d{3})*|\d+)\s*万円?").unwrap()
});

// 「800万円」「1,200万」
static RE_SINGLE_MAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,3}(?:,\d{3})*|\d+)\s*万円?").unwrap());

// 「¥4,000,000」「380,000円」
static RE_YEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"¥\s*(\d{1,3}(?:,\d{3})*|\d+)|(\d{1,3}(?:,\d{3})+)\s*円").unwrap()
});

/// 給与テキストから年収レンジ（円）を抽出する
///
/// ベストエフォート方式: 解釈できない形式は `None` を返し、レコード自体は
/// 落とさない。月給/月収表記は 12 倍で年収換算する。NFKC 正規化後に
/// パターン適用するため、全角数字・全角チルダ・￥ もそのまま扱える。
pub fn parse_salary(text: &str) -> Option<SalaryRange> {
    let cleaned = clean_text(text);
    if cleaned.is_empty() {
        return None;
    }

    let is_monthly = cleaned.contains("月給") || cleaned.contains("月収");
    let is_annual = cleaned.contains("年収");

    let mut amounts: Vec<i64> = Vec::new();

    if let Some(caps) = RE_RANGE_MAN.captures(&cleaned) {
        for idx in [1, 2] {
            if let Some(v) = parse_number(&caps[idx]) {
                amounts.push(v * 10_000);
            }
        }
    } else if is_annual {
        for caps in RE_ANNUAL_MAN.captures_iter(&cleaned) {
            if let Some(v) = parse_number(&caps[1]) {
                amounts.push(v * 10_000);
            }
        }
    }

    if amounts.is_empty() {
        for caps in RE_SINGLE_MAN.captures_iter(&cleaned) {
            if let Some(v) = parse_number(&caps[1]) {
                amounts.push(v * 10_000);
            }
        }
    }

    if amounts.is_empty() {
        for caps in RE_YEN.captures_iter(&cleaned) {
            let raw = caps.get(1).or_else(|| caps.get(2));
            if let Some(v) = raw.and_then(|m| parse_number(m.as_str())) {
                amounts.push(v);
            }
        }
    }

    if is_monthly && !is_annual {
        for amount in amounts.iter_mut() {
            if *amount < MONTHLY_CONVERSION_CEILING {
                *amount *= 12;
            }
        }
    }

    amounts.retain(|v| *v > 0);
    if amounts.is_empty() {
        return None;
    }

    let min = *amounts.iter().min()?;
    let max = *amounts.iter().max()?;

    Some(SalaryRange {
        min,
        max,
        currency: CURRENCY_JPY.to_string(),
    })
}

fn parse_number(raw: &str) -> Option<i64> {
    raw.replace(',', "").parse().ok()
}
