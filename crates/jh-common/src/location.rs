use lazy_static::lazy_static;

use crate::normalize::comparison_form;

lazy_static! {
    /// 地域トークン → 別名リスト。先頭から順に部分一致で判定する。
    ///
    /// 「東京都○○区」が「京都」に吸われないよう、東京は京都より先に置く。
    pub static ref REGION_ALIASES: Vec<(&'static str, Vec<&'static str>)> = vec![
        ("東京", vec!["東京", "tokyo"]),
        ("神奈川", vec!["神奈川", "横浜", "川崎", "kanagawa", "yokohama"]),
        ("千葉", vec!["千葉", "chiba"]),
        ("埼玉", vec!["埼玉", "saitama"]),
        ("大阪", vec!["大阪", "osaka"]),
        ("京都", vec!["京都", "kyoto"]),
        ("兵庫", vec!["兵庫", "神戸", "hyogo", "kobe"]),
        ("愛知", vec!["愛知", "名古屋", "aichi", "nagoya"]),
        ("福岡", vec!["福岡", "fukuoka"]),
        ("北海道", vec!["北海道", "札幌", "hokkaido", "sapporo"]),
        ("宮城", vec!["宮城", "仙台", "miyagi", "sendai"]),
        ("広島", vec!["広島", "hiroshima"]),
        ("沖縄", vec!["沖縄", "okinawa"]),
        ("リモート", vec!["リモート", "在宅", "remote"]),
    ];
}

/// 勤務地の自由記述を地域トークンに正規化する
///
/// 統制語彙に一致しない場合は `None`。呼び出し側は元テキストを保持した上で、
/// 地域スコアリングからのみ除外する。
pub fn normalize_location(input: &str) -> Option<String> {
    let cleaned = comparison_form(input);
    if cleaned.is_empty() {
        return None;
    }

    for (token, aliases) in REGION_ALIASES.iter() {
        if aliases.iter().any(|alias| cleaned.contains(alias)) {
            return Some((*token).to_string());
        }
    }

    None
}

/// 統制語彙に含まれる地域トークンかどうか
pub fn is_region_token(input: &str) -> bool {
    REGION_ALIASES.iter().any(|(token, _)| *token == input)
}
