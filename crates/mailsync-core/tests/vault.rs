//! Credential vault behavior over a file-backed database.

#![allow(clippy::unwrap_used)]

use std::path::PathBuf;

use mailsync_core::{AccountId, CredentialVault, Database, DecryptionError, Error};

fn temp_db_path(name: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir()
        .join(format!("mailsync-test-{}-{nanos}", std::process::id()))
        .join(format!("{name}.db"))
}

#[tokio::test]
async fn concurrent_first_use_provisions_one_key() {
    let path = temp_db_path("concurrent");
    let db = Database::open(&path).await.unwrap();
    let vault = CredentialVault::new(db.keys());
    let account = AccountId::new(7);

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..8 {
        let vault = vault.clone();
        tasks.spawn(async move {
            let plaintext = format!("secret-{i}");
            let ciphertext = vault.encrypt(&plaintext, account).await.unwrap();
            (plaintext, ciphertext)
        });
    }

    let mut pairs = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        pairs.push(joined.unwrap());
    }
    for (plaintext, ciphertext) in pairs {
        assert_eq!(vault.decrypt(&ciphertext, account).await.unwrap(), plaintext);
    }

    if let Some(dir) = path.parent() {
        let _ = std::fs::remove_dir_all(dir);
    }
}

#[tokio::test]
async fn keys_survive_reopening_the_database() {
    let path = temp_db_path("reopen");
    let account = AccountId::new(1);

    let ciphertext = {
        let db = Database::open(&path).await.unwrap();
        CredentialVault::new(db.keys())
            .encrypt("hunter2", account)
            .await
            .unwrap()
    };

    let db = Database::open(&path).await.unwrap();
    let vault = CredentialVault::new(db.keys());
    assert_eq!(vault.decrypt(&ciphertext, account).await.unwrap(), "hunter2");

    let err = vault.decrypt(&ciphertext, AccountId::new(2)).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Decryption(DecryptionError::MissingKey(_))
    ));

    if let Some(dir) = path.parent() {
        let _ = std::fs::remove_dir_all(dir);
    }
}
