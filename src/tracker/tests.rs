//! Unit tests for tracker module

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::testing::{read_json, store_in, tracker_in, StubFetcher};
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use tempfile::tempdir;

    fn quote(market_cap: f64) -> MarketCapQuote {
        MarketCapQuote::new(market_cap, Some("https://dexscreener.com/x".to_string()))
    }

    // ---- entry arithmetic ----

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(0.0), "+0.00%");
        assert_eq!(format_percent(-0.0), "+0.00%");
        assert_eq!(format_percent(50.0), "+50.00%");
        assert_eq!(format_percent(-12.3456), "-12.35%");
        assert_eq!(format_percent(3.14159), "+3.14%");
    }

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(1500.0, 1000.0), 50.0);
        assert_eq!(percent_change(500.0, 1000.0), -50.0);
        assert_eq!(percent_change(1000.0, 3000.0), -66.6667);
        assert_eq!(percent_change(1234.0, 0.0), 0.0);
    }

    #[test]
    fn test_new_entry_is_empty() {
        let posted = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let entry = TokenEntry::new("PEPE", posted);
        assert_eq!(entry.token, "PEPE");
        assert_eq!(entry.time_posted, posted);
        assert!(entry.initial_market_cap.is_none());
        assert!(entry.highest_market_cap.is_none());
        assert!(entry.current_market_cap.is_none());
        assert_eq!(entry.current_percentage, "+0.00%");
        assert_eq!(entry.highest_percent_increase, 0.0);
        assert!(!entry.reached_50);
        assert!(entry.last_checked.is_none());
        assert!(entry.pair_url.is_none());
    }

    #[test]
    fn test_observe_scenario() {
        let mut entry = TokenEntry::new("ABC", Utc::now());
        entry.set_initial(1000.0, None, Utc::now());

        entry.observe(1500.0, None, Utc::now());
        assert_eq!(entry.current_percentage, "+50.00%");
        assert_eq!(entry.highest_percent_increase, 50.0);
        assert!(entry.reached_50);

        entry.observe(1200.0, None, Utc::now());
        assert_eq!(entry.current_percentage, "+20.00%");
        assert_eq!(entry.highest_market_cap, Some(1500.0));
        assert_eq!(entry.current_market_cap, Some(1200.0));
        assert_eq!(entry.highest_percent_increase, 50.0);
        assert!(entry.reached_50);
        assert_eq!(entry.initial_market_cap, Some(1000.0));
    }

    #[test]
    fn test_observe_without_initial_sets_it() {
        let mut entry = TokenEntry::new("ABC", Utc::now());
        entry.observe(800.0, Some("u".to_string()), Utc::now());
        assert_eq!(entry.initial_market_cap, Some(800.0));
        assert_eq!(entry.highest_market_cap, Some(800.0));
        assert_eq!(entry.current_percentage, "+0.00%");
        assert_eq!(entry.pair_url.as_deref(), Some("u"));
        assert!(entry.last_checked.is_some());
    }

    #[test]
    fn test_observe_keeps_pair_url_when_missing() {
        let mut entry = TokenEntry::new("ABC", Utc::now());
        entry.set_initial(100.0, Some("first".to_string()), Utc::now());
        entry.observe(120.0, None, Utc::now());
        assert_eq!(entry.pair_url.as_deref(), Some("first"));
    }

    #[test]
    fn test_highest_percent_monotonic_and_reached_sticky() {
        let mut entry = TokenEntry::new("ABC", Utc::now());
        entry.set_initial(100.0, None, Utc::now());

        let observations = [110.0, 90.0, 149.0, 151.0, 60.0, 140.0, 200.0, 10.0];
        let mut last_highest = 0.0;
        let mut seen_reached = false;
        for mc in observations {
            entry.observe(mc, None, Utc::now());
            assert!(entry.highest_percent_increase >= last_highest);
            last_highest = entry.highest_percent_increase;

            assert!(entry.highest_market_cap.unwrap() >= entry.current_market_cap.unwrap());
            assert_eq!(
                entry.current_percentage,
                format_percent(percent_change(mc, 100.0))
            );

            if seen_reached {
                assert!(entry.reached_50);
            }
            assert_eq!(entry.reached_50, entry.highest_percent_increase >= 50.0);
            seen_reached |= entry.reached_50;
        }
        assert_eq!(entry.highest_percent_increase, 100.0);
        assert!(entry.reached_50);
    }

    #[test]
    fn test_reached_at_exactly_fifty() {
        let mut entry = TokenEntry::new("ABC", Utc::now());
        entry.set_initial(200.0, None, Utc::now());
        entry.observe(299.0, None, Utc::now());
        assert!(!entry.reached_50);
        entry.observe(300.0, None, Utc::now());
        assert!(entry.reached_50);
    }

    #[test]
    fn test_zero_initial_market_cap() {
        let mut entry = TokenEntry::new("ABC", Utc::now());
        entry.set_initial(0.0, None, Utc::now());
        entry.observe(5000.0, None, Utc::now());
        assert_eq!(entry.current_percentage, "+0.00%");
        assert_eq!(entry.highest_percent_increase, 0.0);
        assert!(!entry.reached_50);
        assert_eq!(entry.highest_market_cap, Some(5000.0));
    }

    // ---- lifecycle ----

    #[tokio::test]
    async fn test_track_creates_and_persists() {
        let dir = tempdir().unwrap();
        let stub = StubFetcher::new();
        let tracker = tracker_in(dir.path(), stub.clone());

        assert!(tracker.track("PEPE", Utc::now()).await);
        assert_eq!(tracker.active_token().await.as_deref(), Some("PEPE"));

        let on_disk = read_json(&dir.path().join("current.json"));
        assert_eq!(on_disk["token"], "PEPE");
        assert_eq!(on_disk["initial_market_cap"], json!(null));
        assert_eq!(on_disk["current_percentage"], "+0.00%");
        assert_eq!(on_disk["reached_50"], false);
        assert!(!dir.path().join("history.json").exists());
    }

    #[tokio::test]
    async fn test_ingest_refreshes_initial() {
        let dir = tempdir().unwrap();
        let stub = StubFetcher::new();
        stub.set("PEPE", 1000.0);
        let tracker = tracker_in(dir.path(), stub.clone());

        let tracked = tracker.ingest(&["PEPE".to_string()], Utc::now()).await;
        assert_eq!(tracked, vec!["PEPE"]);

        let entry = tracker.snapshot().await.unwrap();
        assert_eq!(entry.initial_market_cap, Some(1000.0));
        assert_eq!(entry.highest_market_cap, Some(1000.0));
        assert_eq!(entry.current_market_cap, Some(1000.0));
        assert_eq!(entry.current_percentage, "+0.00%");
        assert!(entry.last_checked.is_some());
        assert_eq!(
            entry.pair_url.as_deref(),
            Some("https://dexscreener.com/pair/PEPE")
        );

        let on_disk = read_json(&dir.path().join("current.json"));
        assert_eq!(on_disk["initial_market_cap"], json!(1000.0));
    }

    #[tokio::test]
    async fn test_failed_initial_fetch_leaves_null_state() {
        let dir = tempdir().unwrap();
        let stub = StubFetcher::new();
        stub.set_failing(true);
        let tracker = tracker_in(dir.path(), stub.clone());

        let tracked = tracker.ingest(&["PEPE".to_string()], Utc::now()).await;
        assert_eq!(tracked, vec!["PEPE"]);

        let entry = tracker.snapshot().await.unwrap();
        assert!(entry.initial_market_cap.is_none());
        assert!(entry.last_checked.is_none());
        assert_eq!(entry.current_percentage, "+0.00%");

        // The next observation fills it in
        assert!(tracker.apply_observation("PEPE", quote(700.0)).await);
        let entry = tracker.snapshot().await.unwrap();
        assert_eq!(entry.initial_market_cap, Some(700.0));
        assert_eq!(entry.highest_market_cap, Some(700.0));
    }

    #[tokio::test]
    async fn test_same_token_is_idempotent() {
        let dir = tempdir().unwrap();
        let stub = StubFetcher::new();
        stub.set("PEPE", 1000.0);
        let tracker = tracker_in(dir.path(), stub.clone());

        tracker.ingest(&["PEPE".to_string()], Utc::now()).await;
        stub.set("PEPE", 5000.0);
        let tracked = tracker
            .ingest(&["PEPE".to_string(), "PEPE".to_string()], Utc::now())
            .await;

        assert!(tracked.is_empty());
        assert_eq!(stub.calls(), vec!["PEPE"]);
        let entry = tracker.snapshot().await.unwrap();
        assert_eq!(entry.initial_market_cap, Some(1000.0));
        assert!(tracker.history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_distinct_tokens_archive_in_order() {
        let dir = tempdir().unwrap();
        let stub = StubFetcher::new();
        let tracker = tracker_in(dir.path(), stub.clone());

        let tokens = ["AAA", "BBB", "CCC", "DDD"];
        for (i, token) in tokens.iter().enumerate() {
            stub.set(token, 100.0 * (i + 1) as f64);
            tracker.ingest(&[token.to_string()], Utc::now()).await;
        }

        assert_eq!(tracker.active_token().await.as_deref(), Some("DDD"));
        let history = tracker.history().await.unwrap();
        let archived: Vec<_> = history.iter().map(|e| e.token.as_str()).collect();
        assert_eq!(archived, vec!["AAA", "BBB", "CCC"]);
        assert_eq!(history[1].initial_market_cap, Some(200.0));
    }

    #[tokio::test]
    async fn test_archive_keeps_monitor_mutations() {
        let dir = tempdir().unwrap();
        let stub = StubFetcher::new();
        stub.set("AAA", 1000.0);
        let tracker = tracker_in(dir.path(), stub.clone());

        tracker.ingest(&["AAA".to_string()], Utc::now()).await;
        tracker.apply_observation("AAA", quote(1600.0)).await;
        tracker.ingest(&["BBB".to_string()], Utc::now()).await;

        let history = tracker.history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].current_market_cap, Some(1600.0));
        assert_eq!(history[0].current_percentage, "+60.00%");
        assert!(history[0].reached_50);
    }

    #[tokio::test]
    async fn test_message_cycles_through_tokens() {
        let dir = tempdir().unwrap();
        let stub = StubFetcher::new();
        let tracker = tracker_in(dir.path(), stub.clone());

        let tokens: Vec<String> = ["AAA", "BBB", "BBB", "AAA"].iter().map(|s| s.to_string()).collect();
        let tracked = tracker.ingest(&tokens, Utc::now()).await;

        assert_eq!(tracked, vec!["AAA", "BBB", "AAA"]);
        let archived: Vec<_> = tracker
            .history()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.token)
            .collect();
        assert_eq!(archived, vec!["AAA", "BBB"]);
        assert_eq!(tracker.active_token().await.as_deref(), Some("AAA"));
    }

    #[tokio::test]
    async fn test_observation_for_replaced_token_is_dropped() {
        let dir = tempdir().unwrap();
        let stub = StubFetcher::new();
        let tracker = tracker_in(dir.path(), stub.clone());

        tracker.track("AAA", Utc::now()).await;
        tracker.track("BBB", Utc::now()).await;

        assert!(!tracker.apply_observation("AAA", quote(999.0)).await);
        let entry = tracker.snapshot().await.unwrap();
        assert_eq!(entry.token, "BBB");
        assert!(entry.initial_market_cap.is_none());
        assert!(entry.current_market_cap.is_none());
    }

    #[tokio::test]
    async fn test_empty_quote_is_ignored() {
        let dir = tempdir().unwrap();
        let tracker = tracker_in(dir.path(), StubFetcher::new());
        tracker.track("AAA", Utc::now()).await;

        assert!(!tracker.apply_observation("AAA", MarketCapQuote::empty()).await);
        assert!(tracker.snapshot().await.unwrap().last_checked.is_none());
    }

    #[tokio::test]
    async fn test_refresh_initial_does_not_override_existing_initial() {
        let dir = tempdir().unwrap();
        let stub = StubFetcher::new();
        stub.set("AAA", 5000.0);
        let tracker = tracker_in(dir.path(), stub.clone());

        tracker.track("AAA", Utc::now()).await;
        tracker.apply_observation("AAA", quote(1000.0)).await;

        assert!(!tracker.refresh_initial("AAA").await);
        let entry = tracker.snapshot().await.unwrap();
        assert_eq!(entry.initial_market_cap, Some(1000.0));
    }

    #[tokio::test]
    async fn test_restore_migrates_legacy_file() {
        let dir = tempdir().unwrap();
        let current = dir.path().join("current.json");
        std::fs::write(
            &current,
            json!({
                "token": "OLD",
                "time_posted": "2024-03-01T10:00:00.123456+00:00",
                "initial_price": 0.001,
                "highest_price": 0.002,
                "percent_increase": 12.5,
                "initial_market_cap": 2000.0,
                "highest_market_cap": 2500.0,
                "current_market_cap": 2250.0
            })
            .to_string(),
        )
        .unwrap();

        let stub = StubFetcher::new();
        let tracker = TokenTracker::restore(store_in(dir.path()), stub.clone()).await;

        let entry = tracker.snapshot().await.unwrap();
        assert_eq!(entry.token, "OLD");
        assert_eq!(entry.current_percentage, "+12.50%");
        assert_eq!(entry.highest_percent_increase, 0.0);
        assert!(stub.calls().is_empty());

        let on_disk = read_json(&current);
        assert!(on_disk.get("initial_price").is_none());
        assert!(on_disk.get("percent_increase").is_none());
        assert_eq!(on_disk["current_percentage"], "+12.50%");
        assert_eq!(on_disk["highest_percent_increase"], json!(0.0));
    }

    #[tokio::test]
    async fn test_restore_refreshes_missing_initial() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store.save_current(&TokenEntry::new("NEW", Utc::now())).unwrap();

        let stub = StubFetcher::new();
        stub.set("NEW", 4200.0);
        let tracker = TokenTracker::restore(store_in(dir.path()), stub.clone()).await;

        let entry = tracker.snapshot().await.unwrap();
        assert_eq!(entry.initial_market_cap, Some(4200.0));
        assert_eq!(read_json(&dir.path().join("current.json"))["initial_market_cap"], json!(4200.0));
    }

    #[tokio::test]
    async fn test_restore_with_nothing_on_disk() {
        let dir = tempdir().unwrap();
        let tracker = TokenTracker::restore(store_in(dir.path()), StubFetcher::new()).await;
        assert!(tracker.snapshot().await.is_none());
        assert!(!dir.path().join("current.json").exists());
    }

    #[tokio::test]
    async fn test_seed_static_uses_last_token() {
        let dir = tempdir().unwrap();
        let stub = StubFetcher::new();
        stub.set("SECOND", 10.0);
        let tracker = tracker_in(dir.path(), stub.clone());

        let statics = vec!["FIRST".to_string(), "SECOND".to_string()];
        assert!(tracker.seed_static(&statics).await);
        let entry = tracker.snapshot().await.unwrap();
        assert_eq!(entry.token, "SECOND");
        assert_eq!(entry.initial_market_cap, Some(10.0));

        // Already tracking something: untouched
        assert!(!tracker.seed_static(&["OTHER".to_string()]).await);
        assert_eq!(tracker.active_token().await.as_deref(), Some("SECOND"));
        assert!(!tracker.seed_static(&[]).await);
    }

    // ---- storage ----

    #[test]
    fn test_migrate_keyed_current_layout() {
        let doc = json!({
            "tokens": ["AAA", "BBB"],
            "items": {
                "AAA": {"token": "AAA", "time_posted": "2024-01-01T00:00:00Z"},
                "BBB": {"token": "BBB", "time_posted": "2024-01-02T00:00:00Z", "highest_percent_increase": null}
            }
        });
        let entry = migrate_current(doc).unwrap();
        assert_eq!(entry.token, "BBB");
        assert_eq!(entry.highest_percent_increase, 0.0);
        assert_eq!(entry.current_percentage, "+0.00%");

        let doc = json!({"items": {"ONLY": {"token": "ONLY"}}});
        assert_eq!(migrate_current(doc).unwrap().token, "ONLY");

        let doc = json!({"tokens": ["GONE"], "items": {"AAA": {"token": "AAA"}}});
        assert!(migrate_current(doc).is_none());
    }

    #[test]
    fn test_migrate_rejects_unknown_shapes() {
        assert!(migrate_current(json!([1, 2])).is_none());
        assert!(migrate_current(json!({"foo": "bar"})).is_none());
        assert!(migrate_current(json!("token")).is_none());
    }

    #[test]
    fn test_migrate_string_percent_increase() {
        let entry = migrate_entry(json!({"token": "X", "percent_increase": "+7.00%"})).unwrap();
        assert_eq!(entry.current_percentage, "+7.00%");
    }

    #[test]
    fn test_unreadable_current_file_loads_as_none() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("current.json"), "{not json").unwrap();
        assert!(store_in(dir.path()).load_current().is_none());
    }

    #[test]
    fn test_current_file_round_trip_sorted_keys() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let mut entry = TokenEntry::new("AAA", Utc::now());
        entry.set_initial(10.0, Some("u".to_string()), Utc::now());
        store.save_current(&entry).unwrap();

        let raw = std::fs::read_to_string(store.current_path()).unwrap();
        let current_idx = raw.find("\"current_market_cap\"").unwrap();
        let token_idx = raw.find("\"token\"").unwrap();
        assert!(current_idx < token_idx);

        assert_eq!(store.load_current(), Some(entry));
    }

    #[test]
    fn test_history_accepts_legacy_layouts() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        std::fs::write(
            store.history_path(),
            json!({"items": {
                "AAA": {"token": "AAA", "initial_price": 1.0},
                "BBB": {"token": "BBB"}
            }})
            .to_string(),
        )
        .unwrap();

        store.append_history(&TokenEntry::new("CCC", Utc::now())).unwrap();

        let raw = read_json(store.history_path());
        let records = raw.as_array().unwrap();
        assert_eq!(records.len(), 3);
        // Old records are carried over as they were
        assert_eq!(records[0]["initial_price"], json!(1.0));
        assert_eq!(records[2]["token"], "CCC");

        let typed = store.load_history().unwrap();
        let tokens: Vec<_> = typed.iter().map(|e| e.token.as_str()).collect();
        assert_eq!(tokens, vec!["AAA", "BBB", "CCC"]);
    }

    #[test]
    fn test_history_single_entry_layout() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        std::fs::write(store.history_path(), json!({"token": "SOLO"}).to_string()).unwrap();
        let history = store.load_history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].token, "SOLO");
    }

    #[test]
    fn test_failed_history_append_is_retried() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("later");
        let mut store = EntryStore::new(nested.join("current.json"), nested.join("history.json"));

        assert!(store.append_history(&TokenEntry::new("AAA", Utc::now())).is_err());
        assert_eq!(store.pending_history(), 1);

        std::fs::create_dir_all(&nested).unwrap();
        store.append_history(&TokenEntry::new("BBB", Utc::now())).unwrap();
        assert_eq!(store.pending_history(), 0);

        let tokens: Vec<_> = store
            .load_history()
            .unwrap()
            .into_iter()
            .map(|e| e.token)
            .collect();
        assert_eq!(tokens, vec!["AAA", "BBB"]);
    }

    #[test]
    fn test_corrupt_history_is_moved_aside() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        let history_path = dir.path().join("history.json");
        std::fs::write(&history_path, "{truncated").unwrap();

        store.append_history(&TokenEntry::new("AAA", Utc::now())).unwrap();
        store.append_history(&TokenEntry::new("BBB", Utc::now())).unwrap();
        assert_eq!(store.pending_history(), 0);

        let on_disk = read_json(&history_path);
        assert_eq!(on_disk.as_array().unwrap().len(), 2);
        assert_eq!(on_disk[0]["token"], "AAA");
        assert_eq!(on_disk[1]["token"], "BBB");

        let moved: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with("history.json.corrupt-"))
            .collect();
        assert_eq!(moved.len(), 1);
        assert_eq!(
            std::fs::read_to_string(dir.path().join(&moved[0])).unwrap(),
            "{truncated"
        );
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_memory_state() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("missing");
        let store = EntryStore::new(nested.join("current.json"), nested.join("history.json"));
        let tracker = TokenTracker::new(store, StubFetcher::new(), None);

        assert!(tracker.track("AAA", Utc::now()).await);
        assert!(tracker.track("BBB", Utc::now()).await);
        assert_eq!(tracker.active_token().await.as_deref(), Some("BBB"));
        assert_eq!(tracker.pending_history().await, 1);
        assert!(!nested.join("current.json").exists());
    }
}
