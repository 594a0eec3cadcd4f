use anyhow::Result;
use lantern_core::consensus::period::period_start_slot;
use lantern_core::test_utils::*;
use lantern_core::*;

const PERIOD: u64 = 512;

fn config() -> NetworkConfig {
    NetworkConfig {
        genesis_validators_root: TEST_GENESIS_VALIDATORS_ROOT,
        ..NetworkConfig::sepolia()
    }
}

#[test]
fn bootstrap_then_follow_two_rotations() -> Result<()> {
    let committees: Vec<TestCommittee> = (1..=3).map(TestCommittee::new).collect();
    let (root, bootstrap) = make_bootstrap(&committees[0].committee, period_start_slot(PERIOD) + 1);
    let client = LightClient::bootstrap(config(), &root, &bootstrap)?;
    assert_eq!(client.current_period(), PERIOD);

    for (offset, pair) in committees.windows(2).enumerate() {
        let (signer, next) = (&pair[0], &pair[1]);
        let period = PERIOD + offset as u64;

        let learn = UpdateSpec::in_period(signer, period, 100, 64)
            .next_committee(&next.committee)
            .build();
        let outcome = client.process_update(&learn)?;
        assert_eq!(outcome, CommitOutcome::Applied(ApplyOutcome::Advanced));
        assert!(client.store().has_next_sync_committee());

        let rotate = UpdateSpec::in_period(next, period + 1, 40, 32).build();
        let outcome = client.process_update(&rotate)?;
        assert_eq!(outcome, CommitOutcome::Applied(ApplyOutcome::Rotated));
        assert_eq!(client.current_period(), period + 1);
        assert_eq!(client.store().current_sync_committee(), &next.committee);
    }

    assert_eq!(client.current_period(), PERIOD + 2);
    assert_eq!(client.finalized_header().slot, period_start_slot(PERIOD + 2) + 32);
    Ok(())
}

#[test]
fn replaying_an_update_changes_nothing() -> Result<()> {
    let current = TestCommittee::new(1);
    let next = TestCommittee::new(2);
    let store = store_from_bootstrap(&current, period_start_slot(PERIOD) + 1);

    let update = UpdateSpec::in_period(&current, PERIOD, 100, 64)
        .next_committee(&next.committee)
        .build();
    let accepted = validate_light_client_update(&store, &update, TEST_GENESIS_VALIDATORS_ROOT)?;

    let (once, outcome) = store.apply(&accepted);
    assert_eq!(outcome, ApplyOutcome::Advanced);

    // Still signed after the new finalized slot, so it validates again and changes nothing.
    let replayed = validate_light_client_update(&once, &update, TEST_GENESIS_VALIDATORS_ROOT)?;
    let (twice, outcome) = once.apply(&replayed);
    assert_eq!(outcome, ApplyOutcome::Redundant);
    assert_eq!(once, twice);
    Ok(())
}

#[test]
fn update_signed_before_the_finalized_slot_is_stale() -> Result<()> {
    let current = TestCommittee::new(1);
    let next = TestCommittee::new(2);
    let store = store_from_bootstrap(&current, period_start_slot(PERIOD) + 1);

    let early = UpdateSpec::in_period(&current, PERIOD, 100, 64)
        .next_committee(&next.committee)
        .build();
    let late = UpdateSpec::in_period(&current, PERIOD, 300, 200)
        .next_committee(&next.committee)
        .build();
    let accepted = validate_light_client_update(&store, &late, TEST_GENESIS_VALIDATORS_ROOT)?;
    let (advanced, _) = store.apply(&accepted);
    assert!(early.signature_slot <= advanced.finalized_header().slot);

    let err = validate_light_client_update(&advanced, &early, TEST_GENESIS_VALIDATORS_ROOT)
        .unwrap_err();
    assert_eq!(err.kind(), RejectionKind::Staleness);
    Ok(())
}

#[test]
fn rejected_updates_leave_the_store_untouched() -> Result<()> {
    let current = TestCommittee::new(1);
    let next = TestCommittee::new(2);
    let (root, bootstrap) = make_bootstrap(&current.committee, period_start_slot(PERIOD) + 1);
    let client = LightClient::bootstrap(config(), &root, &bootstrap)?;
    let before = client.store();

    let mut forged_header = UpdateSpec::in_period(&current, PERIOD, 100, 64)
        .next_committee(&next.committee)
        .build();
    forged_header.finalized_header.body_root = [0xee; 32];
    let other_fork = UpdateSpec::in_period(&current, PERIOD, 100, 64)
        .next_committee(&next.committee)
        .fork_version([0x90, 0x00, 0x00, 0x69])
        .build();
    let mut replayed_on_other_fork = other_fork.clone();
    replayed_on_other_fork.fork_version = TEST_FORK_VERSION;
    let too_few = UpdateSpec::in_period(&current, PERIOD, 100, 64)
        .next_committee(&next.committee)
        .participants(300)
        .build();

    let cases = [
        (forged_header, RejectionKind::MerkleProof),
        (replayed_on_other_fork, RejectionKind::Signature),
        (too_few, RejectionKind::InsufficientParticipation),
    ];
    for (update, kind) in cases {
        let err = client.process_update(&update).unwrap_err();
        assert_eq!(err.kind(), kind, "{err}");
        assert_eq!(*client.store(), *before);
    }

    // The update signed for the fork it names is fine.
    client.process_update(&other_fork)?;
    assert!(client.store().has_next_sync_committee());
    Ok(())
}

#[test]
fn checkpoint_agreement_feeds_bootstrap() -> Result<()> {
    let current = TestCommittee::new(1);
    let (root, bootstrap) = make_bootstrap(&current.committee, 4096);
    let hex_root = format!("0x{}", hex::encode(root));

    let dissenter = hex::encode([0x11u8; 32]);

    let reports: Vec<CheckpointReport> = [hex_root.as_str(), hex_root.as_str(), dissenter.as_str()]
        .iter()
        .map(|reported| -> Result<CheckpointReport, CheckpointError> {
            Ok(CheckpointReport {
                block_root: parse_checkpoint_hash(reported)?,
                slot: 4096,
            })
        })
        .collect::<Result<_, CheckpointError>>()?;

    let checkpoint = verify_checkpoint_consensus(&reports, 2)?;
    assert_eq!(checkpoint.block_root, root);

    let client = LightClient::bootstrap(config(), &checkpoint.block_root, &bootstrap)?;
    assert_eq!(client.finalized_header().slot, 4096);
    Ok(())
}
