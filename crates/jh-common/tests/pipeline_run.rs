use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use jh_common::config::CrawlConfig;
use jh_common::dedup::MergePolicy;
use jh_common::pipeline::{Pipeline, RunStage};
use jh_common::source::{SearchCriteria, SourceAdapter, SourceError};
use jh_common::store::{
    JobStore, MemoryJobStore, MemoryMatchStore, MemoryPreferenceStore, PreferenceStore,
};
use jh_common::{CanonicalJob, KeywordPref, RawListing, UserPreference};

struct ScriptedAdapter {
    name: String,
    listings: Vec<RawListing>,
}

#[async_trait]
impl SourceAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, _criteria: &SearchCriteria) -> Result<Vec<RawListing>, SourceError> {
        Ok(self.listings.clone())
    }
}

fn adapter(name: &str, listings: Vec<RawListing>) -> Arc<dyn SourceAdapter> {
    Arc::new(ScriptedAdapter {
        name: name.into(),
        listings,
    })
}

fn ux_listing(source: &str) -> RawListing {
    RawListing {
        source: source.into(),
        url: format!("https://{source}.example/jobs/ux"),
        title: "UXデザイナー".into(),
        company: "Acme".into(),
        location_text: Some("東京都渋谷区".into()),
        salary_text: Some("400万〜600万円".into()),
        description: Some("UX改善を担当します。".into()),
        ..RawListing::default()
    }
}

fn designer_user() -> UserPreference {
    UserPreference {
        user_id: 1,
        keywords: vec![KeywordPref::weighted("デザイナー", 2.0)],
        locations: vec!["東京".into()],
        min_salary: Some(5_000_000),
        excluded_keywords: vec!["急募".into()],
    }
}

fn build_pipeline(
    adapters: Vec<Arc<dyn SourceAdapter>>,
    users: Vec<UserPreference>,
) -> (Pipeline, Arc<MemoryJobStore>, Arc<MemoryMatchStore>) {
    let jobs = Arc::new(MemoryJobStore::new());
    let matches = Arc::new(MemoryMatchStore::new());
    let preferences = Arc::new(MemoryPreferenceStore::new(users));

    let pipeline = Pipeline::new(
        adapters,
        jobs.clone(),
        preferences,
        matches.clone(),
        CrawlConfig::default(),
    );
    (pipeline, jobs, matches)
}

#[tokio::test]
async fn same_posting_from_two_sources_collapses_to_one_job() {
    let mut green = ux_listing("green");
    green.description = Some("UX改善を担当します。自社プロダクトの体験設計全般を任せます。".into());

    let (pipeline, jobs, _) = build_pipeline(
        vec![
            adapter("doda", vec![ux_listing("doda")]),
            adapter("green", vec![green.clone()]),
        ],
        vec![designer_user()],
    );

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.stage, RunStage::Done);
    assert_eq!(report.fetched, 2);
    assert_eq!(report.inserted + report.merged, 2);

    let all = jobs.list_all().await.unwrap();
    assert_eq!(all.len(), 1);

    let job = &all[0];
    assert_eq!(job.fingerprint, "08115537355df7ca");
    assert_eq!(job.location_token.as_deref(), Some("東京"));
    assert_eq!(job.salary.as_ref().map(|s| (s.min, s.max)), Some((4_000_000, 6_000_000)));
    assert_eq!(job.salary.as_ref().map(|s| s.currency.as_str()), Some("JPY"));

    // URL は和集合、説明文は長い方が勝つ
    assert_eq!(job.sources.len(), 2);
    assert!(job.sources.contains_key("doda"));
    assert!(job.sources.contains_key("green"));
    assert_eq!(job.description, green.description);
}

#[tokio::test]
async fn rerunning_an_unchanged_listing_set_adds_no_jobs() {
    let (pipeline, jobs, _) = build_pipeline(
        vec![adapter("doda", vec![ux_listing("doda")])],
        vec![designer_user()],
    );

    let first = pipeline.run().await.unwrap();
    assert_eq!(first.inserted, 1);
    let total_after_first = jobs.stats().await.unwrap().total;

    let second = pipeline.run().await.unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.merged, 1);
    assert_eq!(jobs.stats().await.unwrap().total, total_after_first);
}

#[tokio::test]
async fn excluded_keyword_disqualifies_regardless_of_fit() {
    // 除外語入りの求人はキーワード・勤務地・給与が完璧でもスコア 0
    let mut urgent = ux_listing("doda");
    urgent.title = "シニアデザイナー".into();
    urgent.url = "https://doda.example/jobs/urgent".into();
    urgent.description = Some("【急募】デザイナー募集。東京勤務、年収600万円以上。".into());
    urgent.salary_text = Some("年収600万円".into());

    let mut clean = ux_listing("doda");
    clean.salary_text = Some("年収600万円".into());

    let (pipeline, _, matches) = build_pipeline(
        vec![adapter("doda", vec![urgent, clean])],
        vec![designer_user()],
    );

    pipeline.run().await.unwrap();

    let stored = matches.matches_for(1).await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].fingerprint, "08115537355df7ca");
    assert!(stored[0].reasons.iter().any(|r| r.contains("デザイナー")));
}

#[tokio::test]
async fn unknown_salary_scores_like_a_qualifying_salary() {
    let mut known = ux_listing("doda");
    known.title = "UIデザイナー".into();
    known.url = "https://doda.example/jobs/ui".into();
    known.salary_text = Some("年収600万円".into());

    let mut unknown = ux_listing("doda");
    unknown.title = "Webデザイナー".into();
    unknown.url = "https://doda.example/jobs/web".into();
    unknown.salary_text = None;

    let (pipeline, _, matches) = build_pipeline(
        vec![adapter("doda", vec![known, unknown])],
        vec![designer_user()],
    );

    pipeline.run().await.unwrap();

    let stored = matches.matches_for(1).await;
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].score, stored[1].score);
}

#[tokio::test]
async fn equal_scores_rank_fresher_jobs_first() {
    let jobs_store = Arc::new(MemoryJobStore::new());

    let older = CanonicalJob {
        title: "UXデザイナー".into(),
        company: "Acme".into(),
        location_token: Some("東京".into()),
        first_seen: Some(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()),
        last_seen: Some(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()),
        fingerprint: "fp-older".into(),
        ..CanonicalJob::default()
    };
    let fresher = CanonicalJob {
        title: "UIデザイナー".into(),
        last_seen: Some(Utc.with_ymd_and_hms(2025, 6, 20, 0, 0, 0).unwrap()),
        fingerprint: "fp-fresher".into(),
        ..older.clone()
    };

    jobs_store.upsert(&older, MergePolicy::RicherWins).await.unwrap();
    jobs_store.upsert(&fresher, MergePolicy::RicherWins).await.unwrap();

    let matches = Arc::new(MemoryMatchStore::new());
    let user = UserPreference {
        user_id: 1,
        keywords: vec![KeywordPref::new("デザイナー")],
        locations: vec!["東京".into()],
        ..UserPreference::default()
    };
    let preferences = Arc::new(MemoryPreferenceStore::new(vec![user]));

    // アダプタなしで実行 = マッチングだけがストア全体に対して走る
    let pipeline = Pipeline::new(
        Vec::new(),
        jobs_store,
        preferences,
        matches.clone(),
        CrawlConfig::default(),
    );
    pipeline.run().await.unwrap();

    let stored = matches.matches_for(1).await;
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].score, stored[1].score);
    assert_eq!(stored[0].fingerprint, "fp-fresher");
    assert_eq!(stored[1].fingerprint, "fp-older");
}

#[tokio::test]
async fn preference_store_is_read_only_to_the_pipeline() {
    let preferences = Arc::new(MemoryPreferenceStore::new(vec![designer_user()]));
    let before = preferences.list_active_users().await.unwrap();

    let pipeline = Pipeline::new(
        vec![adapter("doda", vec![ux_listing("doda")])],
        Arc::new(MemoryJobStore::new()),
        preferences.clone(),
        Arc::new(MemoryMatchStore::new()),
        CrawlConfig::default(),
    );
    pipeline.run().await.unwrap();

    let after = preferences.list_active_users().await.unwrap();
    assert_eq!(before, after);
}
