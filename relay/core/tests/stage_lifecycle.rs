// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Stage lifecycle against the real `tar` binary and an in-memory store.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use slurp_core::application::archive_pipeline::ArchivePipeline;
use slurp_core::application::stage_registry::{StageError, StageRegistry};
use slurp_core::domain::build::BuildId;
use slurp_core::domain::credential::OsSecretSource;
use slurp_core::infrastructure::blob_store::InMemoryBlobStore;

fn registry(root: &Path, store: Arc<InMemoryBlobStore>) -> Arc<StageRegistry> {
    Arc::new(StageRegistry::new(
        root,
        ArchivePipeline::new(store, "tar"),
        Arc::new(OsSecretSource),
    ))
}

#[tokio::test]
async fn test_commit_then_seed_reproduces_files() {
    let root = TempDir::new().unwrap();
    let store = Arc::new(InMemoryBlobStore::new());
    let registry = registry(root.path(), store.clone());

    let credential = registry.add_stage("", "b1").await.unwrap();
    assert_eq!(credential.as_str().len(), 32);
    assert!(credential.as_str().chars().all(|c| c.is_ascii_hexdigit()));

    let staged = root.path().join("b1");
    std::fs::write(staged.join("x"), "hi").unwrap();
    std::fs::create_dir_all(staged.join("lib/deep")).unwrap();
    std::fs::write(staged.join("lib/deep/blob.bin"), (0..=255u8).cycle().take(1 << 20).collect::<Vec<_>>()).unwrap();

    registry.commit_stage("b1").await.unwrap();
    assert!(store.blob(&BuildId::parse("b1").unwrap()).is_some());
    assert!(!registry.credentials().contains(credential.as_str()));

    let next = registry.add_stage("b1", "b2").await.unwrap();
    assert_ne!(next, credential);
    let seeded = root.path().join("b2");
    assert_eq!(std::fs::read_to_string(seeded.join("x")).unwrap(), "hi");
    assert_eq!(
        std::fs::read(seeded.join("lib/deep/blob.bin")).unwrap(),
        (0..=255u8).cycle().take(1 << 20).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_committed_archive_extracts_elsewhere() {
    let root = TempDir::new().unwrap();
    let store = Arc::new(InMemoryBlobStore::new());
    let registry = registry(root.path(), store.clone());

    registry.add_stage("", "b1").await.unwrap();
    std::fs::write(root.path().join("b1/x"), "hi").unwrap();
    registry.commit_stage("b1").await.unwrap();

    let elsewhere = TempDir::new().unwrap();
    let pipeline = ArchivePipeline::new(store.clone(), "tar");
    let archive = store.blob(&BuildId::parse("b1").unwrap()).unwrap();
    pipeline
        .extract(std::io::Cursor::new(archive), elsewhere.path())
        .await
        .unwrap();
    assert_eq!(std::fs::read_to_string(elsewhere.path().join("x")).unwrap(), "hi");
}

#[tokio::test]
async fn test_concurrent_adds_issue_distinct_credentials() {
    let root = TempDir::new().unwrap();
    let registry = registry(root.path(), Arc::new(InMemoryBlobStore::new()));

    let mut tasks = Vec::new();
    for n in 0..16 {
        let registry = registry.clone();
        tasks.push(tokio::spawn(async move {
            registry.add_stage("", &format!("build-{}", n)).await
        }));
    }

    let mut secrets = HashSet::new();
    for task in tasks {
        let credential = task.await.unwrap().unwrap();
        assert!(registry.credentials().contains(credential.as_str()));
        secrets.insert(credential.into_inner());
    }
    assert_eq!(secrets.len(), 16);
    assert_eq!(registry.credentials().len(), 16);
}

#[tokio::test]
async fn test_racing_commit_and_delete_have_one_winner() {
    let root = TempDir::new().unwrap();
    let registry = registry(root.path(), Arc::new(InMemoryBlobStore::new()));

    for round in 0..8 {
        let id = format!("race-{}", round);
        registry.add_stage("", &id).await.unwrap();
        std::fs::write(root.path().join(&id).join("x"), "hi").unwrap();

        let (commit, delete) = tokio::join!(
            {
                let registry = registry.clone();
                let id = id.clone();
                tokio::spawn(async move { registry.commit_stage(&id).await })
            },
            {
                let registry = registry.clone();
                let id = id.clone();
                tokio::spawn(async move { registry.delete_stage(&id).await })
            }
        );
        let outcomes = [commit.unwrap(), delete.unwrap()];
        let wins = outcomes.iter().filter(|r| r.is_ok()).count();
        let not_found = outcomes
            .iter()
            .filter(|r| matches!(r, Err(StageError::NotFound(_))))
            .count();
        assert_eq!((wins, not_found), (1, 1), "round {}: {:?}", round, outcomes);
        assert!(registry.credentials().is_empty());
    }
}

#[tokio::test]
async fn test_racing_commits_have_one_winner() {
    let root = TempDir::new().unwrap();
    let registry = registry(root.path(), Arc::new(InMemoryBlobStore::new()));
    registry.add_stage("", "b1").await.unwrap();

    let a = tokio::spawn({
        let registry = registry.clone();
        async move { registry.commit_stage("b1").await }
    });
    let b = tokio::spawn({
        let registry = registry.clone();
        async move { registry.commit_stage("b1").await }
    });
    let outcomes = [a.await.unwrap(), b.await.unwrap()];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|r| matches!(r, Err(StageError::NotFound(_))))
            .count(),
        1
    );
}

#[tokio::test]
async fn test_empty_new_id_issues_nothing() {
    let root = TempDir::new().unwrap();
    let registry = registry(root.path(), Arc::new(InMemoryBlobStore::new()));

    assert!(matches!(
        registry.add_stage("b0", "").await,
        Err(StageError::Validation(_))
    ));
    assert!(registry.credentials().is_empty());
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_delete_twice_succeeds() {
    let root = TempDir::new().unwrap();
    let registry = registry(root.path(), Arc::new(InMemoryBlobStore::new()));

    let credential = registry.add_stage("", "b1").await.unwrap();
    registry.delete_stage("b1").await.unwrap();
    assert!(!root.path().join("b1").exists());
    assert!(!registry.credentials().contains(credential.as_str()));
    registry.delete_stage("b1").await.unwrap();
}

#[tokio::test]
async fn test_add_during_delete_never_loses_its_directory() {
    let root = TempDir::new().unwrap();
    let registry = registry(root.path(), Arc::new(InMemoryBlobStore::new()));

    registry.add_stage("", "b1").await.unwrap();
    let staged = root.path().join("b1");
    for n in 0..20 {
        let sub = staged.join(format!("d{}", n));
        std::fs::create_dir(&sub).unwrap();
        for f in 0..1000 {
            std::fs::write(sub.join(f.to_string()), "x").unwrap();
        }
    }

    let delete = tokio::spawn({
        let registry = registry.clone();
        async move { registry.delete_stage("b1").await }
    });
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let added = registry.add_stage("", "b1").await;
    delete.await.unwrap().unwrap();

    match added {
        Ok(credential) => {
            assert!(registry.credentials().contains(credential.as_str()));
            assert!(staged.is_dir());
            assert_eq!(std::fs::read_dir(&staged).unwrap().count(), 0);
        }
        Err(StageError::Deleting(_)) | Err(StageError::AlreadyStaged(_)) => {
            assert!(registry.credentials().is_empty());
            assert!(!staged.exists());

            // the id is usable again once the delete is done
            registry.add_stage("", "b1").await.unwrap();
            assert!(staged.is_dir());
        }
        Err(other) => panic!("unexpected add outcome: {:?}", other),
    }
}
