//! Harvest loop tests against a scripted feed
//!
//! Each test builds a small fake site, runs the loop with every delay at zero
//! and inspects the record store, the checkpoint and the navigation log.

use crate::support::*;
use comment_harvest::storage::{
    rewind_checkpoint, CheckpointStore, CsvRecordSink, JsonCheckpointStore,
};
use comment_harvest::{HarvestError, HarvestOutcome, HarvestPhase, UrlMode};
use std::path::Path;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn checkpoint_page(config: &comment_harvest::Config) -> u32 {
    JsonCheckpointStore::new(Path::new(&config.output.checkpoint_path))
        .load()
        .unwrap()
        .last_page
}

fn four_page_feed() -> FakeFeed {
    let feed = FakeFeed::new();
    feed.comments(1, &["Tesla to the moon", "Buy the dip"])
        .comments(2, &["Earnings next week", "Margins look thin"])
        .comments(3, &["Robotaxi soon", "Sell the rip"])
        .comments(4, &["Long and strong"])
        .end_at(5);
    feed
}

#[tokio::test]
async fn test_full_harvest_until_empty_page() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let feed = four_page_feed();

    let mut harvester = harvester(config.clone(), FakeLauncher::new(&feed));
    let outcome = harvester.run().await.unwrap();

    assert_eq!(outcome, HarvestOutcome::Completed { last_page: 4 });
    assert_eq!(harvester.phase(), HarvestPhase::Done);
    assert_eq!(checkpoint_page(&config), 4);

    let records = stored_records(&config);
    assert_eq!(records.len(), 7);
    assert_eq!(records[0].page, 1);
    assert_eq!(records[0].index_in_page, 1);
    assert_eq!(records[0].author, "user1000");
    assert_eq!(records[2].source_url, path_url(2));

    assert_eq!(harvester.counters().pages_committed, 4);
    assert_eq!(harvester.counters().records_written, 7);
    // the session is closed when the run ends
    assert_eq!(feed.closes(), feed.launches().len());
}

#[tokio::test]
async fn test_resume_matches_uninterrupted_run() {
    let straight_dir = TempDir::new().unwrap();
    let straight_config = test_config(straight_dir.path());
    let feed = four_page_feed();
    harvester(straight_config.clone(), FakeLauncher::new(&feed))
        .run()
        .await
        .unwrap();

    let resumed_dir = TempDir::new().unwrap();
    let mut first_leg = test_config(resumed_dir.path());
    first_leg.feed.max_pages = 2;
    let outcome = harvester(first_leg.clone(), FakeLauncher::new(&feed))
        .run()
        .await
        .unwrap();
    assert_eq!(outcome, HarvestOutcome::PageLimitReached { last_page: 2 });

    let second_leg = test_config(resumed_dir.path());
    let resumed_feed = four_page_feed();
    let outcome = harvester(second_leg.clone(), FakeLauncher::new(&resumed_feed))
        .run()
        .await
        .unwrap();
    assert_eq!(outcome, HarvestOutcome::Completed { last_page: 4 });

    // the second leg starts after the checkpoint
    assert_eq!(resumed_feed.visited()[0], path_url(3));

    let straight = stored_records(&straight_config);
    let resumed = stored_records(&second_leg);
    assert_eq!(resumed.len(), straight.len());
    assert_eq!(fingerprints(&resumed), fingerprints(&straight));
}

#[tokio::test]
async fn test_rerun_after_completion_adds_nothing() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let feed = four_page_feed();

    harvester(config.clone(), FakeLauncher::new(&feed))
        .run()
        .await
        .unwrap();
    let before = stored_records(&config);

    // the next run starts at the empty page and stops at once
    let outcome = harvester(config.clone(), FakeLauncher::new(&feed))
        .run()
        .await
        .unwrap();
    assert_eq!(outcome, HarvestOutcome::Completed { last_page: 4 });
    assert_eq!(stored_records(&config), before);
}

#[tokio::test]
async fn test_duplicates_survive_once_across_pages() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let feed = FakeFeed::new();
    feed.comments(1, &["same old", "first only"])
        .comments(2, &["  same old  ", "fresh", "fresh"])
        .comments(3, &["first only"])
        .end_at(4);

    let mut harvester = harvester(config.clone(), FakeLauncher::new(&feed));
    let outcome = harvester.run().await.unwrap();
    assert_eq!(outcome, HarvestOutcome::Completed { last_page: 3 });

    let records = stored_records(&config);
    let bodies: Vec<&str> = records.iter().map(|r| r.body.as_str()).collect();
    assert_eq!(bodies, vec!["same old", "first only", "fresh"]);
    assert_eq!(harvester.counters().duplicates_dropped, 3);

    let checkpoint = JsonCheckpointStore::new(Path::new(&config.output.checkpoint_path))
        .load()
        .unwrap();
    assert_eq!(checkpoint.seen_fingerprints.len(), 3);
    // a page whose comments were all known still advances the cursor
    assert_eq!(checkpoint.last_page, 3);
}

#[tokio::test]
async fn test_stops_on_empty_page_without_fetching_further() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let feed = FakeFeed::new();
    feed.comments(1, &["one"])
        .comments(2, &["two"])
        .end_at(3)
        .comments(4, &["never read"]);

    let outcome = harvester(config.clone(), FakeLauncher::new(&feed))
        .run()
        .await
        .unwrap();

    assert_eq!(outcome, HarvestOutcome::Completed { last_page: 2 });
    assert_eq!(checkpoint_page(&config), 2);
    assert!(!feed
        .visited()
        .iter()
        .any(|url| url == &path_url(4) || url == &query_url(4)));
}

#[tokio::test]
async fn test_alternate_scheme_url_is_recorded() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    assert_eq!(config.feed.url_mode, UrlMode::Auto);

    let feed = FakeFeed::new();
    feed.comments(1, &["page one"])
        .serve(query_url(2), Response::Html(comment_page(&["only under query"])))
        .end_at(3);

    let outcome = harvester(config.clone(), FakeLauncher::new(&feed))
        .run()
        .await
        .unwrap();
    assert_eq!(outcome, HarvestOutcome::Completed { last_page: 2 });

    let records = stored_records(&config);
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].page, 2);
    assert_eq!(records[1].source_url, query_url(2));
    assert_eq!(records[0].source_url, path_url(1));
}

#[tokio::test]
async fn test_failed_page_is_skipped() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.feed.url_mode = UrlMode::Path;

    let feed = FakeFeed::new();
    for page in 1..=4 {
        feed.comments(page, &[&format!("comment on page {}", page)]);
    }
    feed.serve(path_url(5), Response::Broken)
        .comments(6, &["after the gap"])
        .end_at(7);

    let mut harvester = harvester(config.clone(), FakeLauncher::new(&feed));
    let outcome = harvester.run().await.unwrap();

    assert_eq!(outcome, HarvestOutcome::Completed { last_page: 6 });
    assert_eq!(checkpoint_page(&config), 6);
    assert_eq!(harvester.counters().pages_skipped, 1);

    let records = stored_records(&config);
    assert!(records.iter().all(|r| r.page != 5));
    assert_eq!(records.last().unwrap().body, "after the gap");

    // every attempt at page 5 was used
    let attempts = feed.visited().iter().filter(|u| **u == path_url(5)).count();
    assert_eq!(attempts, config.fetch.max_attempts as usize);
}

#[tokio::test]
async fn test_session_open_failure_is_fatal() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    JsonCheckpointStore::new(Path::new(&config.output.checkpoint_path))
        .save(7, &Default::default())
        .unwrap();

    let feed = four_page_feed();
    let launcher = FakeLauncher::new(&feed)
        .failing("primary")
        .failing("fallback");
    let mut harvester = harvester(config.clone(), launcher);

    let result = harvester.run().await;
    assert!(matches!(
        result,
        Err(HarvestError::SessionInit { attempts: 2, .. })
    ));
    assert_eq!(harvester.phase(), HarvestPhase::Fatal);
    assert_eq!(harvester.last_committed_page(), 7);
    assert_eq!(checkpoint_page(&config), 7);
    assert_eq!(
        feed.launches(),
        vec!["primary", "fallback", "primary", "fallback"]
    );
    assert!(feed.visited().is_empty());
}

#[tokio::test]
async fn test_failing_sink_halts_without_advancing() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let feed = four_page_feed();
    let checkpoints = JsonCheckpointStore::new(Path::new(&config.output.checkpoint_path));
    let mut harvester = harvester_with_stores(
        config.clone(),
        FakeLauncher::new(&feed),
        Box::new(checkpoints),
        Box::new(BrokenSink),
    );

    let result = harvester.run().await;

    assert!(matches!(result, Err(HarvestError::Persistence(_))));
    assert_eq!(harvester.phase(), HarvestPhase::Fatal);
    assert_eq!(harvester.last_committed_page(), 0);
    assert_eq!(checkpoint_page(&config), 0);
    assert_eq!(feed.visited(), vec![path_url(1)]);
    assert_eq!(feed.closes(), 1);
}

#[tokio::test]
async fn test_failing_checkpoint_save_halts_mid_run() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let feed = four_page_feed();
    let sink = CsvRecordSink::new(Path::new(&config.output.records_path));
    let mut harvester = harvester_with_stores(
        config.clone(),
        FakeLauncher::new(&feed),
        Box::new(FlakyCheckpoints::new(&config, 1)),
        Box::new(sink),
    );

    let result = harvester.run().await;

    assert!(matches!(result, Err(HarvestError::Persistence(_))));
    assert_eq!(harvester.phase(), HarvestPhase::Fatal);
    assert_eq!(harvester.last_committed_page(), 1);

    let checkpoint = JsonCheckpointStore::new(Path::new(&config.output.checkpoint_path))
        .load()
        .unwrap();
    assert_eq!(checkpoint.last_page, 1);
    assert_eq!(checkpoint.seen_fingerprints.len(), 2);
    // page 3 is never requested after the failed commit of page 2
    assert!(!feed.visited().contains(&path_url(3)));
}

#[tokio::test]
async fn test_fresh_pass_keeps_stored_comments_unique() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let feed = FakeFeed::new();
    feed.comments(1, &["Tesla to the moon", "Buy the dip"])
        .comments(2, &["Earnings next week"])
        .end_at(3);

    harvester(config.clone(), FakeLauncher::new(&feed))
        .run()
        .await
        .unwrap();
    assert_eq!(stored_records(&config).len(), 3);

    let mut checkpoints = JsonCheckpointStore::new(Path::new(&config.output.checkpoint_path));
    let sink = CsvRecordSink::new(Path::new(&config.output.records_path));
    assert_eq!(rewind_checkpoint(&mut checkpoints, &sink).unwrap(), 3);
    assert_eq!(checkpoint_page(&config), 0);

    let rerun_feed = FakeFeed::new();
    rerun_feed
        .comments(1, &["Tesla to the moon", "Buy the dip"])
        .comments(2, &["Earnings next week", "New after restart"])
        .end_at(3);
    let outcome = harvester(config.clone(), FakeLauncher::new(&rerun_feed))
        .run()
        .await
        .unwrap();

    assert_eq!(outcome, HarvestOutcome::Completed { last_page: 2 });
    assert_eq!(rerun_feed.visited()[0], path_url(1));
    let records = stored_records(&config);
    assert_eq!(records.len(), 4);
    assert_eq!(fingerprints(&records).len(), records.len());
    assert_eq!(records[3].body, "New after restart");
}

#[tokio::test]
async fn test_fallback_profile_is_used() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let feed = four_page_feed();

    let outcome = harvester(config, FakeLauncher::new(&feed).failing("primary"))
        .run()
        .await
        .unwrap();

    assert_eq!(outcome, HarvestOutcome::Completed { last_page: 4 });
    assert_eq!(feed.launches(), vec!["primary", "fallback"]);
}

#[tokio::test]
async fn test_session_is_recycled_on_budget() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.session.recycle_every_pages = 2;
    let feed = four_page_feed();

    let mut harvester = harvester(config, FakeLauncher::new(&feed));
    harvester.run().await.unwrap();

    // pages 1-2, 3-4 and 5 each get their own session
    assert_eq!(feed.launches().len(), 3);
    assert_eq!(feed.closes(), 3);
    assert_eq!(harvester.counters().sessions_opened, 3);
}

#[tokio::test]
async fn test_page_limit_stops_the_run() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.feed.max_pages = 2;
    let feed = four_page_feed();

    let outcome = harvester(config.clone(), FakeLauncher::new(&feed))
        .run()
        .await
        .unwrap();

    assert_eq!(outcome, HarvestOutcome::PageLimitReached { last_page: 2 });
    assert!(!feed.visited().contains(&path_url(3)));
}

#[tokio::test]
async fn test_checkpoint_past_limit_does_nothing() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.feed.max_pages = 3;
    JsonCheckpointStore::new(Path::new(&config.output.checkpoint_path))
        .save(3, &Default::default())
        .unwrap();
    let feed = four_page_feed();

    let outcome = harvester(config, FakeLauncher::new(&feed))
        .run()
        .await
        .unwrap();

    assert_eq!(outcome, HarvestOutcome::PageLimitReached { last_page: 3 });
    assert!(feed.launches().is_empty());
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let feed = four_page_feed();
    let token = CancellationToken::new();
    token.cancel();

    let mut harvester = harvester(config.clone(), FakeLauncher::new(&feed)).with_cancellation(token);
    let outcome = harvester.run().await.unwrap();

    assert_eq!(outcome, HarvestOutcome::Interrupted { last_page: 0 });
    assert_eq!(harvester.phase(), HarvestPhase::Interrupted);
    assert!(feed.visited().is_empty());
    assert_eq!(checkpoint_page(&config), 0);
}

#[tokio::test]
async fn test_interrupt_never_commits_partial_pages() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let feed = four_page_feed();
    let token = CancellationToken::new();
    feed.cancel_on(path_url(3), token.clone());

    let mut harvester = harvester(config.clone(), FakeLauncher::new(&feed)).with_cancellation(token);
    let outcome = harvester.run().await.unwrap();

    // page 3 may or may not have finished before the signal was seen
    let last_page = match outcome {
        HarvestOutcome::Interrupted { last_page } => last_page,
        other => panic!("unexpected outcome {:?}", other),
    };
    assert!(last_page == 2 || last_page == 3, "last page {}", last_page);
    assert_eq!(checkpoint_page(&config), last_page);

    let records = stored_records(&config);
    assert!(records.iter().all(|r| r.page <= last_page));
    assert!(!feed.visited().contains(&path_url(4)));

    // resuming finishes the feed without duplicates
    let resumed = harvester_for_resume(&config, &feed).await;
    assert_eq!(resumed, HarvestOutcome::Completed { last_page: 4 });
    let records = stored_records(&config);
    assert_eq!(records.len(), 7);
    assert_eq!(fingerprints(&records).len(), 7);
}

async fn harvester_for_resume(
    config: &comment_harvest::Config,
    feed: &FakeFeed,
) -> HarvestOutcome {
    harvester(config.clone(), FakeLauncher::new(feed))
        .run()
        .await
        .unwrap()
}
