//! `run_search` reports: outcomes for every mode, ledgers kept on failure,
//! and JSON persistence through the filesystem.

use dtp_core::config::{CandidateScope, SearchConfig};
use dtp_core::driver::Confirmation;
use dtp_core::oracle::EvaluationPurpose;
use dtp_core::report::{
    SEARCH_REPORT_SCHEMA_VERSION, SearchOutcome, SearchReport, SearchRequest, load_search_report,
    run_search, write_search_report,
};
use dtp_error::ErrorKind;
use dtp_harness::{SyntheticSuite, log_search_report, numbered_universe};
use dtp_types::cx::Cx;
use dtp_types::{TestId, TestOrder};

fn order(ids: &[&str]) -> TestOrder {
    TestOrder::new(ids.iter().copied()).unwrap()
}

fn bisect_request() -> SearchRequest {
    SearchRequest::Bisect {
        failing_test: TestId::from("F"),
        universe: order(&["A", "B", "C", "D", "E", "F"]),
    }
}

#[test]
fn bisect_report_lists_every_evaluation() {
    let mut suite = SyntheticSuite::new().pollutes("B", "F");
    let report = run_search(&mut suite, &Cx::new(), &SearchConfig::default(), &bisect_request());

    assert_eq!(report.schema_version, SEARCH_REPORT_SCHEMA_VERSION);
    assert!(report.report_id.starts_with("dtp-"));
    assert_eq!(report.failing_test.as_ref().map(TestId::as_str), Some("F"));
    assert_eq!(
        report.outcome,
        SearchOutcome::Culprit {
            failing_test: TestId::from("F"),
            culprit: TestId::from("B"),
            confirmed_by: Confirmation::DoubleCheck,
        }
    );

    let purposes: Vec<EvaluationPurpose> = report.evaluations.iter().map(|r| r.purpose).collect();
    assert_eq!(
        purposes,
        vec![
            EvaluationPurpose::IsolationCheck,
            EvaluationPurpose::ReproductionCheck,
            EvaluationPurpose::BisectStep,
            EvaluationPurpose::BisectStep,
            EvaluationPurpose::DoubleCheck,
        ]
    );
    for (index, record) in report.evaluations.iter().enumerate() {
        assert_eq!(record.index, index);
        assert!(record.target_failed.is_some());
    }
    assert_eq!(report.evaluations[0].target_failed, Some(false));
    assert_eq!(report.evaluations[1].order_len, 6);
    assert_eq!(report.steps.len(), 2);
    assert_eq!(report.steps[0].evaluation_index, 2);
    log_search_report(&report);
}

#[test]
fn failed_search_keeps_its_ledger() {
    let mut suite = SyntheticSuite::new().pollutes_jointly(["A", "D"], "F");
    let request = SearchRequest::Bisect {
        failing_test: TestId::from("F"),
        universe: order(&["A", "B", "C", "D", "F"]),
    };
    let report = run_search(&mut suite, &Cx::new(), &SearchConfig::default(), &request);
    assert_eq!(report.error_kind(), Some(ErrorKind::CulpritNotConfirmed));
    assert_eq!(report.evaluation_count(), 5);
    assert_eq!(report.steps.len(), 2);
    match &report.outcome {
        SearchOutcome::Failed { suggestion, .. } => assert!(suggestion.is_some()),
        other => panic!("expected a failed outcome, got {other:?}"),
    }
    assert!(report.culprit().is_none());
}

#[test]
fn fuzz_report_carries_the_failing_ordering() {
    let universe = numbered_universe(10);
    let victim = universe.as_slice()[2].clone();
    let mut suite = SyntheticSuite::new().pollutes(universe.as_slice()[7].clone(), victim.clone());
    let request = SearchRequest::Fuzz {
        universe: universe.clone(),
    };
    let report = run_search(&mut suite, &Cx::new(), &SearchConfig::default(), &request);

    assert_eq!(report.mode, "fuzz");
    let SearchOutcome::FailingOrder {
        run,
        failing_test,
        ordering,
    } = &report.outcome
    else {
        panic!("expected a failing ordering, got {:?}", report.outcome);
    };
    assert_eq!(failing_test, &victim);
    assert_eq!(ordering.last(), Some(&victim));
    assert_eq!(report.evaluation_count(), *run as usize);
    assert!(
        report
            .evaluations
            .iter()
            .all(|r| r.purpose == EvaluationPurpose::FuzzRun && r.target_failed.is_none())
    );
}

#[test]
fn fuzz_then_bisect_report() {
    let universe = numbered_universe(10);
    let victim = universe.as_slice()[2].clone();
    let polluter = universe.as_slice()[7].clone();
    let mut suite = SyntheticSuite::new().pollutes(polluter.clone(), victim.clone());
    let request = SearchRequest::FuzzThenBisect { universe };
    let report = run_search(&mut suite, &Cx::new(), &SearchConfig::default(), &request);

    assert_eq!(report.mode, "fuzz_then_bisect");
    assert_eq!(report.culprit(), Some(&polluter));
    assert_eq!(report.failing_test.as_ref(), Some(&victim));
    assert_eq!(report.evaluation_count(), suite.call_count());
}

#[test]
fn fuzz_exhaustion_report() {
    let mut suite = SyntheticSuite::new();
    let config = SearchConfig::default().with_max_fuzz_runs(4);
    let request = SearchRequest::FuzzThenBisect {
        universe: numbered_universe(6),
    };
    let report = run_search(&mut suite, &Cx::new(), &config, &request);
    assert_eq!(report.error_kind(), Some(ErrorKind::FuzzExhausted));
    assert_eq!(report.evaluation_count(), 4);
    assert!(report.summary_line().contains("fuzz_exhausted"));
}

#[test]
fn report_survives_a_round_trip_through_disk() {
    let mut suite = SyntheticSuite::new().pollutes("B", "F");
    let config = SearchConfig::default().with_candidate_scope(CandidateScope::WholeUniverse);
    let report = run_search(&mut suite, &Cx::new(), &config, &bisect_request());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reports").join("search.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    write_search_report(&path, &report).unwrap();

    let loaded = load_search_report(&path).unwrap();
    assert_eq!(loaded, report);
    assert_eq!(loaded.config.candidate_scope, CandidateScope::WholeUniverse);

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["outcome"]["status"], "culprit");
    assert_eq!(raw["outcome"]["culprit"], "B");
    assert_eq!(raw["evaluations"][0]["purpose"], "isolation_check");
}

#[test]
fn failed_report_round_trips() {
    let mut suite = SyntheticSuite::new();
    let report = run_search(&mut suite, &Cx::new(), &SearchConfig::default(), &bisect_request());
    let restored = SearchReport::from_json(&report.to_json().unwrap()).unwrap();
    assert_eq!(restored.error_kind(), Some(ErrorKind::NotReproducible));
    assert_eq!(restored, report);
}

#[test]
fn loading_garbage_or_missing_files_fails_cleanly() {
    let dir = tempfile::tempdir().unwrap();

    let missing = load_search_report(&dir.path().join("absent.json")).unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::Io);

    let garbage_path = dir.path().join("garbage.json");
    std::fs::write(&garbage_path, "{ not json").unwrap();
    let garbage = load_search_report(&garbage_path).unwrap_err();
    assert_eq!(garbage.kind(), ErrorKind::Encoding);
    assert!(garbage.to_string().contains("report encoding error"));
}

#[test]
fn cancelled_before_start_reports_zero_evaluations() {
    let cx = Cx::new();
    cx.cancel();
    let mut suite = SyntheticSuite::new().pollutes("B", "F");
    let report = run_search(&mut suite, &cx, &SearchConfig::default(), &bisect_request());
    assert_eq!(report.error_kind(), Some(ErrorKind::Cancelled));
    assert_eq!(report.evaluation_count(), 0);
    assert_eq!(suite.call_count(), 0);
}
