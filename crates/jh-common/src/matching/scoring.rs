use super::weights::Weights;
use crate::location::normalize_location;
use crate::normalize::{clean_text, comparison_form};
use crate::{CanonicalJob, UserPreference};

#[derive(Debug, Clone)]
pub struct MatchingConfig {
    pub weights: Weights,
    /// 保存対象とする合成スコアの下限（0〜100）
    pub min_score: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            weights: Weights::default(),
            min_score: 50.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ComponentScore {
    /// 0.0〜1.0
    pub score: f64,
    pub detail: String,
}

#[derive(Debug, Clone)]
pub struct MatchScore {
    /// 0〜100 の合成スコア
    pub total: f64,
    pub keyword: ComponentScore,
    pub location: ComponentScore,
    pub salary: ComponentScore,
    /// 寄与した条件の列挙（キーワード → 勤務地 → 給与の順）
    pub reasons: Vec<String>,
    pub disqualified_by: Option<String>,
}

/// 求人とユーザー条件のスコアリング
///
/// 決定的: 同一の (求人, 条件) ペアは常に同一スコアを返す。
/// 除外キーワードは減点ではなく失格で、合成スコアを厳密に 0 にする。
pub fn score_job(job: &CanonicalJob, pref: &UserPreference, config: &MatchingConfig) -> MatchScore {
    let haystack = build_haystack(job);

    for excluded in &pref.excluded_keywords {
        let needle = comparison_form(excluded);
        if !needle.is_empty() && haystack.contains(&needle) {
            let detail = format!("除外キーワード検出: {excluded}");
            return MatchScore {
                total: 0.0,
                keyword: ComponentScore {
                    score: 0.0,
                    detail: detail.clone(),
                },
                location: ComponentScore {
                    score: 0.0,
                    detail: detail.clone(),
                },
                salary: ComponentScore {
                    score: 0.0,
                    detail: detail.clone(),
                },
                reasons: vec![detail],
                disqualified_by: Some(excluded.clone()),
            };
        }
    }

    let mut reasons = Vec::new();
    let keyword = score_keywords(&haystack, pref, &mut reasons);
    let location = score_location(job, pref, &mut reasons);
    let salary = score_salary(job, pref, &mut reasons);

    let weights = &config.weights;
    let weight_sum = weights.sum();
    let total = if weight_sum > 0.0 {
        (keyword.score * weights.keyword
            + location.score * weights.location
            + salary.score * weights.salary)
            / weight_sum
            * 100.0
    } else {
        0.0
    };

    MatchScore {
        total,
        keyword,
        location,
        salary,
        reasons,
        disqualified_by: None,
    }
}

fn build_haystack(job: &CanonicalJob) -> String {
    let title = comparison_form(&job.title);
    match job.description.as_deref() {
        Some(description) => format!("{} {}", title, comparison_form(description)),
        None => title,
    }
}

fn score_keywords(
    haystack: &str,
    pref: &UserPreference,
    reasons: &mut Vec<String>,
) -> ComponentScore {
    if pref.keywords.is_empty() {
        return ComponentScore {
            score: 1.0,
            detail: "キーワード条件なし".into(),
        };
    }

    let total_weight: f64 = pref.keywords.iter().map(|k| k.effective_weight()).sum();
    if total_weight <= 0.0 {
        return ComponentScore {
            score: 1.0,
            detail: "キーワード重みの合計がゼロ".into(),
        };
    }

    let mut matched_weight = 0.0;
    let mut matched_count = 0usize;
    for keyword in &pref.keywords {
        let needle = comparison_form(&keyword.term);
        if !needle.is_empty() && haystack.contains(&needle) {
            matched_weight += keyword.effective_weight();
            matched_count += 1;
            reasons.push(format!("キーワード一致: {}", keyword.term));
        }
    }

    ComponentScore {
        score: matched_weight / total_weight,
        detail: format!(
            "キーワード{}件中{}件に一致 (重み {:.1}/{:.1})",
            pref.keywords.len(),
            matched_count,
            matched_weight,
            total_weight
        ),
    }
}

fn score_location(
    job: &CanonicalJob,
    pref: &UserPreference,
    reasons: &mut Vec<String>,
) -> ComponentScore {
    if pref.locations.is_empty() {
        return ComponentScore {
            score: 1.0,
            detail: "勤務地条件なし".into(),
        };
    }

    let Some(token) = job.location_token.as_deref() else {
        return ComponentScore {
            score: 0.0,
            detail: "勤務地トークンなし".into(),
        };
    };

    let matched = pref.locations.iter().any(|preferred| {
        normalize_location(preferred)
            .unwrap_or_else(|| clean_text(preferred))
            .as_str()
            == token
    });

    if matched {
        reasons.push(format!("勤務地一致: {token}"));
        ComponentScore {
            score: 1.0,
            detail: format!("希望勤務地に一致: {token}"),
        }
    } else {
        ComponentScore {
            score: 0.0,
            detail: format!("勤務地不一致: {token}"),
        }
    }
}

fn score_salary(
    job: &CanonicalJob,
    pref: &UserPreference,
    reasons: &mut Vec<String>,
) -> ComponentScore {
    let Some(min_salary) = pref.min_salary else {
        return ComponentScore {
            score: 1.0,
            detail: "給与条件なし".into(),
        };
    };

    let Some(salary) = &job.salary else {
        // 給与不明は不利にしない
        return ComponentScore {
            score: 1.0,
            detail: "給与情報なし (中立扱い)".into(),
        };
    };

    if salary.min >= min_salary {
        reasons.push(format!("給与条件充足: 下限{}円以上", min_salary));
        ComponentScore {
            score: 1.0,
            detail: format!("給与下限 {}円 ≥ 希望 {}円", salary.min, min_salary),
        }
    } else if salary.max < min_salary {
        ComponentScore {
            score: 0.0,
            detail: format!("給与上限 {}円 < 希望 {}円", salary.max, min_salary),
        }
    } else {
        ComponentScore {
            score: 0.5,
            detail: format!(
                "給与レンジ {}〜{}円 が希望 {}円 をまたぐ",
                salary.min, salary.max, min_salary
            ),
        }
    }
}
