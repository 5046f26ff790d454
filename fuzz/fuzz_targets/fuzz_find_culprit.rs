#![no_main]

//! Drive `find_culprit` with arbitrary pollution graphs.
//!
//! Byte 0 picks the universe size, byte 1 the fallback mode, and the rest
//! are read in triples `(kind, a, b)` describing polluter edges, joint
//! pairs, repairs and intrinsically failing tests. The search must never
//! panic or report an internal error, and any culprit it names must
//! reproduce the failure as a pair.

use dtp_core::config::{ConfirmFallback, SearchConfig};
use dtp_core::driver::find_culprit;
use dtp_error::ErrorKind;
use dtp_harness::{SyntheticSuite, numbered_universe};
use dtp_types::cx::Cx;
use dtp_types::TestOrder;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let [size, mode, rest @ ..] = data else {
        return;
    };
    let n = usize::from(*size % 48) + 2;
    let universe = numbered_universe(n);
    let ids = universe.as_slice();
    let failing = ids[n - 1].clone();

    let mut suite = SyntheticSuite::new();
    for triple in rest.chunks_exact(3).take(32) {
        let a = ids[usize::from(triple[1]) % n].clone();
        let b = ids[usize::from(triple[2]) % n].clone();
        suite = match triple[0] % 4 {
            0 => suite.pollutes(a, failing.clone()),
            1 => suite.pollutes_jointly([a, b], failing.clone()),
            2 => suite.repairs(a, failing.clone()),
            _ => suite.always_fails(b),
        };
    }
    let reference = suite.clone();

    let fallback = if mode % 2 == 0 {
        ConfirmFallback::Stop
    } else {
        ConfirmFallback::LinearScan
    };
    let config = SearchConfig::default().with_confirm_fallback(fallback);

    match find_culprit(&mut suite, &Cx::new(), &config, &failing, &universe) {
        Ok(finding) => {
            assert_ne!(finding.culprit, failing);
            assert!(universe.contains(&finding.culprit));
            let pair = TestOrder::pair(finding.culprit.clone(), failing.clone());
            assert!(reference.outcome(&pair).contains(&failing));
            assert_eq!(finding.evaluations, suite.call_count());
        }
        Err(error) => {
            assert_ne!(error.kind(), ErrorKind::Internal, "{error}");
            assert_ne!(error.kind(), ErrorKind::OracleFailure, "{error}");
        }
    }
});
