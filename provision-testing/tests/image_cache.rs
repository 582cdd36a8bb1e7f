//! Content-addressed image reuse: hit avoids the upload, miss registers.

use provision_contracts::ComputeApi;
use provision_engine::ImageResolver;
use provision_testing::{FakeCompute, FakeImageBuild};
use provision_types::Arch;

#[tokio::test]
async fn matching_identity_reuses_the_registered_image() {
    let compute = FakeCompute::new();
    let existing = compute.add_image(Arch::Aarch64, "cachedhash", "nixos-aarch64-cached");
    let builder = FakeImageBuild::new("cachedhash");

    let artifact = ImageResolver::new(&compute, &builder)
        .resolve(Arch::Aarch64)
        .await
        .expect("resolution succeeds");

    assert_eq!(artifact.image_id.as_deref(), Some(existing.as_str()));
    assert!(compute.uploads().is_empty());
    assert_eq!(builder.realize_count(), 0);
}

#[tokio::test]
async fn new_identity_uploads_registers_and_cleans_up() {
    let compute = FakeCompute::new();
    compute.add_image(Arch::Aarch64, "oldhash", "nixos-aarch64-old");
    let builder = FakeImageBuild::new("freshhash9000");

    let artifact = ImageResolver::new(&compute, &builder)
        .resolve(Arch::Aarch64)
        .await
        .expect("resolution succeeds");

    assert!(artifact.image_id.is_some());
    assert_eq!(artifact.content_hash, "freshhash9000");
    assert_eq!(builder.realize_count(), 1);

    let uploads = compute.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].0, "nixos-aarch64-freshhash900.qcow2");
    assert_eq!(compute.deleted_objects(), vec![uploads[0].0.clone()]);

    // The new identity is now findable for the next resolution.
    let hits = compute
        .find_images("freshhash9000", Arch::Aarch64)
        .await
        .expect("listing succeeds");
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn same_hash_different_arch_is_a_miss() {
    let compute = FakeCompute::new();
    compute.add_image(Arch::X86_64, "sharedhash", "nixos-x86_64-shared");
    let builder = FakeImageBuild::new("sharedhash");

    ImageResolver::new(&compute, &builder)
        .resolve(Arch::Aarch64)
        .await
        .expect("resolution succeeds");

    assert_eq!(compute.uploads().len(), 1);
}

#[tokio::test]
async fn keep_staged_leaves_the_object_in_the_bucket() {
    let compute = FakeCompute::new();
    let builder = FakeImageBuild::new("freshhash9000");

    ImageResolver::new(&compute, &builder)
        .keep_staged_object()
        .resolve(Arch::Aarch64)
        .await
        .expect("resolution succeeds");

    assert_eq!(compute.uploads().len(), 1);
    assert!(compute.deleted_objects().is_empty());
}
