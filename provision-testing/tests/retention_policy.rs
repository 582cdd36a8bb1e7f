//! Keep-N-newest pruning: ordering, thresholds and best-effort deletion.

use provision_engine::prune;
use provision_testing::FakeCompute;
use provision_types::Arch;

fn seeded(count: usize) -> (FakeCompute, Vec<String>) {
    let compute = FakeCompute::new();
    let ids = (0..count)
        .map(|index| {
            compute.add_image(
                Arch::Aarch64,
                &format!("hash{index}"),
                &format!("nixos-aarch64-{index}"),
            )
        })
        .collect();
    (compute, ids)
}

#[tokio::test]
async fn deletes_exactly_the_oldest_beyond_the_threshold() {
    let (compute, ids) = seeded(5);

    let deleted = prune(&compute, 3, true, |_| panic!("force skips confirmation"))
        .await
        .expect("prune succeeds");

    // Images are registered oldest first; the two oldest go.
    assert_eq!(deleted, vec![ids[1].clone(), ids[0].clone()]);
    assert_eq!(compute.image_ids(), ids[2..].to_vec());
}

#[tokio::test]
async fn keeps_everything_when_at_or_below_the_threshold() {
    let (compute, ids) = seeded(3);

    let deleted = prune(&compute, 3, true, |_| true).await.expect("prune succeeds");

    assert!(deleted.is_empty());
    assert_eq!(compute.image_ids(), ids);
}

#[tokio::test]
async fn declining_the_confirmation_deletes_nothing() {
    let (compute, ids) = seeded(5);
    let mut seen = 0;

    let deleted = prune(&compute, 2, false, |candidates| {
        seen = candidates.len();
        false
    })
    .await
    .expect("prune succeeds");

    assert_eq!(seen, 3);
    assert!(deleted.is_empty());
    assert_eq!(compute.image_ids(), ids);
}

#[tokio::test]
async fn individual_failures_do_not_abort_the_batch() {
    let (compute, ids) = seeded(4);
    compute.fail_deleting(&ids[1]);

    let deleted = prune(&compute, 1, true, |_| true).await.expect("prune succeeds");

    // Candidates are ids[2], ids[1], ids[0] newest-first; the failing one
    // is skipped with a warning.
    assert_eq!(deleted, vec![ids[2].clone(), ids[0].clone()]);
    assert!(compute.image_ids().contains(&ids[1]));
}
